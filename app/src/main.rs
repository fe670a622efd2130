mod cli;
mod global_settings;

use global_settings::GlobalSettings;

fn main() -> miette::Result<()> {
    let settings = GlobalSettings::from_env();
    settings.init_logger();
    cli::exec(&settings)
}
