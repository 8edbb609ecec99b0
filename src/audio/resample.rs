use std::borrow::Cow;

/// Resample one block of mono audio with linear interpolation
///
/// Equal (or zero) rates borrow the input untouched. Otherwise the output holds
/// `ceil(len / ratio)` samples where `ratio = source_rate / target_rate`.
/// No filter state is carried between blocks, so block edges are not smoothed.
pub fn resample(block: &[f32], source_rate: u32, target_rate: u32) -> Cow<'_, [f32]> {
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 || block.is_empty() {
        return Cow::Borrowed(block);
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = (block.len() as f64 / ratio).ceil() as usize;
    let last = block.len() - 1;

    let output = (0..output_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let fraction = (position - index as f64) as f32;

            let a = block[index];
            let b = block[next];
            a + (b - a) * fraction
        })
        .collect();

    Cow::Owned(output)
}
