use url::Url;

/// Region used when none can be recovered from the endpoint host.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Extract the signing region from an endpoint URL.
///
/// Recognized hosts:
/// - function URLs: `<id>.lambda-url.<region>.on.aws`
/// - service endpoints: `<service>.<region>.amazonaws.com`
pub fn region_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').collect();

    if host.ends_with(".on.aws")
        && let Some(index) = labels.iter().position(|label| *label == "lambda-url")
    {
        return labels.get(index + 1).filter(|label| looks_like_region(label)).map(|label| label.to_string());
    }

    if host.ends_with(".amazonaws.com")
        && let Some(index) = labels.iter().position(|label| *label == "amazonaws")
        && index > 0
    {
        return Some(labels[index - 1]).filter(|label| looks_like_region(label)).map(str::to_string);
    }

    None
}

fn looks_like_region(label: &str) -> bool {
    let mut parts = label.split('-');
    let prefix_ok = parts.next().is_some_and(|prefix| prefix.len() == 2 && prefix.chars().all(|ch| ch.is_ascii_lowercase()));
    let rest: Vec<&str> = parts.collect();
    prefix_ok && rest.len() >= 2 && rest.last().is_some_and(|number| number.chars().all(|ch| ch.is_ascii_digit()))
}
