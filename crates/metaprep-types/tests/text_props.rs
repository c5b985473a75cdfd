use metaprep_types::text::{dedent, justify, DedentOptions, Justify};
use proptest::prelude::*;

// -- Strategy helpers --

fn arb_indented_block() -> impl Strategy<Value = String> {
    prop::collection::vec((0usize..8, "[a-z(){};=][a-z(){};= ]{0,11}"), 1..8).prop_map(|lines| {
        lines
            .into_iter()
            .map(|(indent, text)| format!("{}{}", " ".repeat(indent), text))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn arb_column() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Z_]{1,10}", 1..6)
}

proptest! {
    #[test]
    fn dedent_is_idempotent(text in arb_indented_block()) {
        let once = dedent(&text, DedentOptions::default());
        let twice = dedent(&once, DedentOptions::default());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn dedent_leaves_some_line_flush(text in arb_indented_block()) {
        let out = dedent(&text, DedentOptions::default());
        let non_blank: Vec<&str> = out.lines().filter(|l| !l.trim().is_empty()).collect();
        if !non_blank.is_empty() {
            prop_assert!(non_blank.iter().any(|l| !l.starts_with(' ')));
        }
    }

    #[test]
    fn dedent_preserves_relative_indentation(text in arb_indented_block()) {
        let out = dedent(&text, DedentOptions::default());
        let before: Vec<&str> = text.lines().map(str::trim).collect();
        let after: Vec<&str> = out.lines().map(str::trim).collect();
        prop_assert_eq!(before.len(), after.len());
        prop_assert_eq!(before, after);
    }

    #[test]
    fn justified_columns_share_width(names in arb_column()) {
        let rows: Vec<Vec<(Justify, String)>> = names
            .iter()
            .map(|n| vec![(Justify::Left, n.clone()), (Justify::Right, n.len().to_string())])
            .collect();
        let out = justify(&rows);
        let width = out[0][0].len();
        prop_assert!(out.iter().all(|row| row[0].len() == width));
        prop_assert!(out.iter().all(|row| row[0].trim_end().len() <= width));
    }
}
