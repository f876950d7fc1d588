use std::collections::HashMap;
use std::hash::Hash;

use crate::model::{StyleProfile, TextSpan};

/// Dominant body font size and font name, chosen independently.
///
/// Returns `None` for an empty span sequence.
pub fn profile_body_style(spans: &[TextSpan]) -> Option<StyleProfile> {
    let body_size_bits = most_frequent(spans.iter().map(|span| span.font_size.to_bits()))?;
    let body_font = most_frequent(spans.iter().map(|span| span.font_name.as_str()))?;

    Some(StyleProfile {
        body_size: f32::from_bits(body_size_bits),
        body_font: body_font.to_string(),
    })
}

/// Mode of `values`; among equal counts the value seen first wins.
fn most_frequent<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Copy,
    I: IntoIterator<Item = T>,
{
    let mut counts = HashMap::<T, (usize, usize)>::new();
    for (position, value) in values.into_iter().enumerate() {
        counts.entry(value).or_insert((0, position)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (left_count, left_first)), (_, (right_count, right_first))| {
            left_count
                .cmp(right_count)
                .then(right_first.cmp(left_first))
        })
        .map(|(value, _)| value)
}
