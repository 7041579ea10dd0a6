//! Help output colors, in cargo's palette.

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;

/// Headers and usage are bold green; literals, placeholders and accepted
/// values (target types, formats) are cyan. Errors are bold red to match
/// the `error:` prefix printed by `main`.
pub fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
		.error(AnsiColor::Red.on_default().bold())
}
