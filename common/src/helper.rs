/// Formats an error followed by its whole chain of sources
///
/// Used by the `Debug` implementations of the error types, so that a `{:?}` in a log line
/// shows every underlying cause and not only the outer message.
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
