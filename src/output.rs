use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `VARSTORE_QUIET=1` (or `true`) suppresses banners
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("VARSTORE_QUIET")
            .map(|v| quiet_flag(&v))
            .unwrap_or(false)
    })
}

fn quiet_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
