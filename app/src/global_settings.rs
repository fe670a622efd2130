use std::env;
use std::str::FromStr;

use corvid_lang_printer::{ColorChoice, DEFAULT_WIDTH};

/// Settings of the `cvc` binary that come from the environment rather than the
/// command line.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    pub colorize: ColorChoice,
    pub log_level: log::LevelFilter,
    /// Line width of IR dumps printed to the terminal.
    pub width: usize,
}

impl GlobalSettings {
    pub fn from_env() -> Self {
        let terminal_width = termsize::get().map(|size| size.cols as usize);
        Self::from_vars(|key| env::var(key).ok(), terminal_width)
    }

    /// `CORVID_COLORIZE` wins over `NO_COLOR`; `CORVID_WIDTH` wins over the terminal size.
    fn from_vars(var: impl Fn(&str) -> Option<String>, terminal_width: Option<usize>) -> Self {
        let colorize = match var("CORVID_COLORIZE").and_then(|v| ColorChoice::from_str(&v).ok()) {
            Some(choice) => choice,
            None if var("NO_COLOR").is_some_and(|v| !v.is_empty()) => ColorChoice::Never,
            None => ColorChoice::Auto,
        };
        let log_level = var("CORVID_LOG_LEVEL")
            .and_then(|v| log::LevelFilter::from_str(&v.to_uppercase()).ok())
            .unwrap_or(log::LevelFilter::Warn);
        let width = var("CORVID_WIDTH")
            .and_then(|v| v.parse().ok())
            .filter(|w| *w > 0)
            .or(terminal_width)
            .unwrap_or(DEFAULT_WIDTH);
        Self { colorize, log_level, width }
    }

    pub fn init_logger(&self) {
        env_logger::Builder::new().filter_level(self.log_level).format_timestamp(None).init();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn settings(vars: &[(&str, &str)], terminal_width: Option<usize>) -> GlobalSettings {
        let lookup = |key: &str| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string());
        GlobalSettings::from_vars(lookup, terminal_width)
    }

    #[test]
    fn defaults() {
        let s = settings(&[], None);
        assert_eq!(s.colorize, ColorChoice::Auto);
        assert_eq!(s.log_level, log::LevelFilter::Warn);
        assert_eq!(s.width, DEFAULT_WIDTH);
    }

    #[test]
    fn no_color_disables_colors_unless_overridden() {
        assert_eq!(settings(&[("NO_COLOR", "1")], None).colorize, ColorChoice::Never);
        assert_eq!(settings(&[("NO_COLOR", "")], None).colorize, ColorChoice::Auto);
        let forced = settings(&[("NO_COLOR", "1"), ("CORVID_COLORIZE", "always")], None);
        assert_eq!(forced.colorize, ColorChoice::Always);
    }

    #[test]
    fn log_level_is_case_insensitive() {
        assert_eq!(settings(&[("CORVID_LOG_LEVEL", "debug")], None).log_level, log::LevelFilter::Debug);
        assert_eq!(settings(&[("CORVID_LOG_LEVEL", "loud")], None).log_level, log::LevelFilter::Warn);
    }

    #[test]
    fn explicit_width_wins_over_terminal() {
        assert_eq!(settings(&[], Some(80)).width, 80);
        assert_eq!(settings(&[("CORVID_WIDTH", "120")], Some(80)).width, 120);
        assert_eq!(settings(&[("CORVID_WIDTH", "0")], Some(80)).width, 80);
    }
}
