use std::fmt;

use miette::Report;

use corvid_lang_printer::ColorChoice;

/// Terminal width for pretty-printing diagnostics.
const TERMINAL_WIDTH: usize = 200;

struct WriteAdapter<'a, O: std::io::Write>(&'a mut O);

impl<O: std::io::Write> fmt::Write for WriteAdapter<'_, O> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

pub fn render_reports_to_string(reports: &[Report], colorize: ColorChoice) -> String {
    let mut output = String::new();
    // Writing into a `String` cannot fail.
    let _ = render_reports(&mut output, reports, colorize);
    output
}

pub fn render_reports_io<O>(output: &mut O, reports: &[Report], colorize: ColorChoice) -> fmt::Result
where
    O: std::io::Write,
{
    let mut adapter = WriteAdapter(output);
    render_reports(&mut adapter, reports, colorize)
}

pub fn render_reports<O>(output: &mut O, reports: &[Report], colorize: ColorChoice) -> fmt::Result
where
    O: fmt::Write,
{
    let theme = match colorize {
        ColorChoice::Always | ColorChoice::AlwaysAnsi => miette::GraphicalTheme::unicode(),
        ColorChoice::Auto => miette::GraphicalTheme::default(),
        ColorChoice::Never => miette::GraphicalTheme::unicode_nocolor(),
    };
    let handler = miette::GraphicalReportHandler::new_themed(theme).with_width(TERMINAL_WIDTH);

    let mut reports = reports.iter().peekable();
    while let Some(report) = reports.next() {
        handler.render_report(output, report.as_ref())?;
        if reports.peek().is_some() {
            writeln!(output)?;
        }
    }
    Ok(())
}
