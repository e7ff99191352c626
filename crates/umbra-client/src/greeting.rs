/// Opening assistant line naming the provider and where it runs
///
/// Blank inputs are treated as absent.
pub fn greeting(display_name: Option<&str>, host: Option<&str>) -> String {
    let display_name = display_name.map(str::trim).filter(|s| !s.is_empty());
    let host = host.map(str::trim).filter(|s| !s.is_empty());

    match (display_name, host) {
        (Some(name), Some(host)) => format!("Secure channel ready with {name} at {host}. How can I help today?"),
        (Some(name), None) => format!("Secure channel ready with {name}. How can I help today?"),
        (None, Some(host)) => format!("Secure channel ready at {host}. How can I help today?"),
        (None, None) => "Secure channel ready. How can I help today?".to_owned(),
    }
}
