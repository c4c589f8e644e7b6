//! Start-up banner.

/// Boxed one-line header with version, build date and commit.
pub fn render(version: &str, build_date: &str, commit: &str) -> String {
    let info = format!("|  manabuild {version}, build date: {build_date}, last commit: {commit}  |");
    let border = format!("+{}+", "-".repeat(info.chars().count() - 2));
    format!("{border}\n{info}\n{border}")
}
