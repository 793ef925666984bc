//! Line-oriented interactive session.
//!
//! Every plain line replaces the text and regenerates the image on the
//! [`Regenerator`] worker. Lines starting with `:` are commands:
//!
//! | Command        | Effect                                            |
//! |----------------|---------------------------------------------------|
//! | `:fg SPEC`     | Foreground color (`white`, `#RRGGBB`, `h,b,a`)    |
//! | `:bg SPEC`     | Background color                                  |
//! | `:copy`        | Current image to the clipboard                    |
//! | `:save [PATH]` | Current image to a PNG file, asks when no path    |
//! | `:print`       | Terminal preview of the current text              |
//! | `:quit`        | Ends the session, as does end of input            |

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::color::ColorSpec;
use crate::error::QRResult;
use crate::export::{
    ensure_png_extension, export, place_on_clipboard, ClipboardSink, ExportTarget,
    PromptSaveDialog, SaveDialog,
};
use crate::pipeline::{Preview, Regenerator};
use crate::render::to_terminal_string;
use crate::settings::{PreferenceFile, Preferences, Settings};
use crate::symbol::{QrCodeEncoder, SymbolEncoder};

pub const SUGGESTED_FILE_NAME: &str = "qrcode.png";

const GENERATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Text(String),
    Fg(ColorSpec),
    Bg(ColorSpec),
    Copy,
    Save(Option<PathBuf>),
    Print,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let Some(cmd) = line.strip_prefix(':') else {
            return Ok(Self::Text(line.to_string()));
        };

        let (name, arg) = match cmd.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (cmd, ""),
        };
        let color = |arg: &str| arg.parse::<ColorSpec>().map_err(|e| e.to_string());

        match (name, arg) {
            ("fg", spec) if !spec.is_empty() => color(spec).map(Self::Fg),
            ("bg", spec) if !spec.is_empty() => color(spec).map(Self::Bg),
            ("copy", "") => Ok(Self::Copy),
            ("save", "") => Ok(Self::Save(None)),
            ("save", path) => Ok(Self::Save(Some(PathBuf::from(path)))),
            ("print", "") => Ok(Self::Print),
            ("quit" | "q", "") => Ok(Self::Quit),
            _ => Err(format!("unknown command '{line}', try :fg, :bg, :copy, :save, :print or :quit")),
        }
    }
}

/// Each line is handled to completion before the next is read. The shell waits
/// for its own submission, so requests never pile up on the [`Regenerator`].
pub struct Shell<C> {
    settings: Settings,
    prefs: Preferences,
    store: Option<PreferenceFile>,
    regen: Regenerator,
    preview: Preview,
    clipboard: C,
}

impl<C: ClipboardSink> Shell<C> {
    /// Starts from the settings stored in `prefs`. Changes are written back to
    /// `store` when one is given.
    pub fn new(
        settings: Settings,
        prefs: Preferences,
        store: Option<PreferenceFile>,
        clipboard: C,
    ) -> QRResult<Self> {
        let regen = Regenerator::spawn()?;
        Ok(Self { settings, prefs, store, regen, preview: Preview::new(), clipboard })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> QRResult<()> {
        self.regenerate(&mut output)?;

        loop {
            write!(output, "> ")?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }

            match Command::parse(line) {
                Ok(Command::Quit) => break,
                Ok(cmd) => self.handle(cmd, &mut input, &mut output)?,
                Err(e) => writeln!(output, "{e}")?,
            }
        }

        Ok(())
    }

    fn handle<R: BufRead, W: Write>(
        &mut self,
        cmd: Command,
        input: &mut R,
        output: &mut W,
    ) -> QRResult<()> {
        match cmd {
            Command::Text(text) => {
                self.settings.text = text;
                self.changed(output)
            }
            Command::Fg(spec) => {
                self.settings.fg = spec;
                self.changed(output)
            }
            Command::Bg(spec) => {
                self.settings.bg = spec;
                self.changed(output)
            }
            Command::Copy => {
                match self.preview.current() {
                    Some(img) => {
                        place_on_clipboard(img, &mut self.clipboard);
                        writeln!(output, "Copied {}x{} image", img.width(), img.height())?;
                    }
                    None => writeln!(output, "Nothing to copy")?,
                }
                Ok(())
            }
            Command::Save(path) => {
                let path = match path {
                    Some(path) => Some(ensure_png_extension(path)),
                    None => PromptSaveDialog::new(&mut *input, &mut *output)
                        .choose_path(SUGGESTED_FILE_NAME),
                };
                self.save(path, output)
            }
            Command::Print => {
                match QrCodeEncoder::new(self.settings.ec_level).encode(&self.settings.text) {
                    Ok(grid) => write!(output, "{}", to_terminal_string(&grid))?,
                    Err(e) => writeln!(output, "{e}")?,
                }
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }

    fn save<W: Write>(&mut self, path: Option<PathBuf>, output: &mut W) -> QRResult<()> {
        let Some(path) = path else {
            writeln!(output, "Save cancelled")?;
            return Ok(());
        };
        let Some(img) = self.preview.current() else {
            writeln!(output, "Nothing to save")?;
            return Ok(());
        };

        match export(img, &ExportTarget::File(path.clone()), &mut self.clipboard) {
            Ok(()) => writeln!(output, "Saved {}", path.display())?,
            Err(e) => writeln!(output, "Failed to save {}: {e}", path.display())?,
        }
        Ok(())
    }

    fn changed<W: Write>(&mut self, output: &mut W) -> QRResult<()> {
        self.prefs.apply_settings(&self.settings);
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.prefs) {
                warn!("Failed to save preferences: {e}");
            }
        }
        self.regenerate(output)
    }

    fn regenerate<W: Write>(&mut self, output: &mut W) -> QRResult<()> {
        self.regen.submit(self.settings.clone());
        let Some(generated) = self.regen.recv_timeout(GENERATION_TIMEOUT) else {
            writeln!(output, "Generation timed out")?;
            return Ok(());
        };

        if let Err(e) = &generated.result {
            writeln!(output, "{e}")?;
        }
        if let Err(e) = self.preview.refresh(generated.result) {
            warn!("Preview not updated: {e}");
        }
        Ok(())
    }
}
