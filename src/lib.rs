mod define;

pub use define::define_grammar;
pub use define::DefinitionError;


mod grammar;

pub use grammar::ConfigurationError;
pub use grammar::Grammar;
pub use grammar::Matcher;
pub use grammar::MatcherSpec;
pub use grammar::Rewrite;


mod input;

pub use input::Input;
pub use input::Position;


mod parse;

pub use parse::MatchResult;
pub use parse::ParseError;
pub use parse::Parser;


pub mod report;

pub use report::describe;


mod tree;

pub use tree::RuleNode;
pub use tree::RuleTree;
pub use tree::Slot;
pub use tree::TreePrinter;
