use std::time::Duration;

/// Renders a duration as a single rounded component in one of: us, ms, s, m.
/// Keeps progress lines and the banner short and stable.
pub(crate) fn format_duration(d: Duration) -> String {
    let total_ns: u128 = (d.as_secs() as u128) * 1_000_000_000u128 + (d.subsec_nanos() as u128);

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;
    const NS_PER_M: u128 = 60 * 1_000_000_000;

    fn round_div(value: u128, unit: u128) -> u128 {
        (value + (unit / 2)) / unit
    }

    if total_ns >= NS_PER_M && total_ns % NS_PER_M == 0 {
        return format!("{}m", total_ns / NS_PER_M);
    }
    if total_ns >= NS_PER_S {
        return format!("{}s", round_div(total_ns, NS_PER_S));
    }
    if total_ns >= NS_PER_MS {
        return format!("{}ms", round_div(total_ns, NS_PER_MS));
    }

    format!("{}us", round_div(total_ns, NS_PER_US))
}
