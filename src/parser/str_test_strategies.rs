use proptest::prelude::*;


pub(crate) fn simple_number_strategy() -> impl Strategy<Value = String> {
    (0u16..=1000).prop_map(|n| n.to_string())
}

pub(crate) fn simple_dice_strategy() -> impl Strategy<Value = String> {
    (1u16..=100, 1u16..=1000)
        .prop_map(|(count, size)| format!("{}d{}", count, size))
}

pub(crate) fn option_strategy(size: u16) -> impl Strategy<Value = String> {
    (0u8..10, 0u16..=size, 1u16..=size).prop_map(move |(kind, n, face)| {
        match kind {
            0 => format!("k{n}"),
            1 => format!("kl{n}"),
            2 => "!".into(),
            3 => format!("r{face}"),
            4 => format!(">={face}"),
            5 => format!("~<={face}"),
            6 => format!("b={face},{size}"),
            7 => format!("x>{face}"),
            8 => format!(">={face}cs{size}"),
            _ => format!("==\"{face}\"cs"),
        }
    })
}

pub(crate) fn dice_with_options_strategy() -> impl Strategy<Value = String> {
    (1u16..=20, 2u16..=20)
        .prop_flat_map(|(count, size)| {
            prop::collection::vec(option_strategy(size), 0..4)
                .prop_map(move |options| format!("{}d{}{}", count, size, options.concat()))
        })
}

pub(crate) fn registry_dice_strategy() -> impl Strategy<Value = String> {
    (1u16..=10, prop_oneof!["F", "f", "skill", "skillb4", "skill<=2cs1", "glyph", "glyphx='sun'"])
        .prop_map(|(count, code)| format!("{}d{}", count, code))
}

pub(crate) fn dice_expression_strategy() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        simple_number_strategy(),
        simple_dice_strategy(),
        dice_with_options_strategy(),
        registry_dice_strategy(),
    ];

    (
        prop::collection::vec((prop_oneof![Just(" + "), Just(" - ")], leaf), 1..5),
        prop::option::of((prop_oneof![Just("<"), Just("<="), Just(">"), Just(">=")], -50i32..50))
    ).prop_map(|(terms, comparison)| {
        let mut expr: String = terms.into_iter()
            .enumerate()
            .map(|(i, (sign, term))| if i == 0 { term } else { format!("{sign}{term}") })
            .collect();

        if let Some((op, value)) = comparison {
            expr.push_str(&format!(" {op} {value}"));
        }

        expr
    })
}
