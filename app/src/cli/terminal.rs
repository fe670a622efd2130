use std::io::Write;

use corvid_lang_ir::Binary;
use corvid_lang_printer::{PrintCfg, PrintExt, StandardStream};

use crate::GlobalSettings;

pub fn print_binary(bin: &Binary, settings: &GlobalSettings) -> std::io::Result<()> {
    let cfg = PrintCfg { width: settings.width, ..Default::default() };
    let mut stream = StandardStream::stdout(settings.colorize);
    bin.print_colored(&cfg, &mut stream)?;
    stream.flush()
}
