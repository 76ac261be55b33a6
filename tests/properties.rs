use packrat::{define_grammar, Grammar, Input, Parser, Position};

use proptest::prelude::*;


fn naive_position(text: &str, offset: usize) -> Position {
    let (mut line, mut column) = (1, 1);
    for ch in text[..offset].chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        }
        else {
            column += 1;
        }
    }
    Position { line, column }
}

fn words_and_spaces() -> Parser {
    define_grammar(r#"
        Text : (Word | Space)* END ;
        Word : ("a".."z")+ ;
        Space : " "+ ;
    "#)
        .expect("Grammar definition ok")
        .build()
        .expect("Grammar builds")
}

proptest! {
    #[test]
    fn literal_matches_exactly_its_prefix(word in "[a-z]{1,8}", rest in "\\PC{0,12}") {
        let mut grammar = Grammar::new();
        let literal = grammar.literal(word.as_str());
        let parser = grammar.build().expect("Grammar builds");

        let input = format!("{word}{rest}");
        let result = parser.execute(literal, &input);
        prop_assert!(result.is_ok());
        prop_assert_eq!(result.next_offset, word.len());
        prop_assert_eq!(result.value, word.clone());

        if !rest.starts_with(word.as_str()) {
            prop_assert!(parser.execute(literal, &rest).has_error());
        }
    }

    #[test]
    fn positions_agree_with_a_linear_scan(text in "[ab\u{e9}\u{4e16}\r\n]{0,40}", pick in any::<prop::sample::Index>()) {
        let boundaries: Vec<usize> = text.char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let offset = boundaries[pick.index(boundaries.len())];

        prop_assert_eq!(Input::new(&text).position(offset), naive_position(&text, offset));
    }

    #[test]
    fn leaves_reassemble_the_input(text in "[a-z ]{0,30}") {
        let parser = words_and_spaces();
        let result = parser.parse_string(&text, "Text").expect("Text is a rule");
        prop_assert!(result.is_ok());

        let leaves: String = result.tree.leaves()
            .into_iter()
            .filter_map(|leaf| leaf.text())
            .collect();
        prop_assert_eq!(leaves, text);
    }

    #[test]
    fn repeated_parses_are_identical(text in "[a-z ,]{0,30}") {
        let parser = words_and_spaces();
        let first = parser.parse_string(&text, "Text").expect("Text is a rule");
        let second = parser.parse_string(&text, "Text").expect("Text is a rule");

        prop_assert_eq!(first.is_ok(), !text.contains(','));
        prop_assert_eq!(first, second);
    }
}
