//! qrbar - QR codes from the command line.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qrbar::export::{ensure_png_extension, export, ExportTarget, SystemClipboard};
use qrbar::render::to_terminal_string;
use qrbar::settings::{PreferenceFile, DEFAULT_SIZE, MAX_SIDE};
use qrbar::shell::Shell;
use qrbar::{regenerate, ColorSpec, ECLevel, QrCodeEncoder, Settings, SymbolEncoder};

/// qrbar - Generate, preview, copy and save QR codes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Preference file to use instead of the platform default:
    /// - Linux: ~/.config/qrbar/preferences.toml
    /// - macOS: ~/Library/Application Support/qrbar/preferences.toml
    /// - Windows: %APPDATA%\qrbar\preferences.toml
    #[arg(long, value_name = "PATH", global = true)]
    prefs: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a QR code from TEXT, or from the remembered text
    Generate(GenerateArgs),

    /// Inspect or reset the stored preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Interactive session, one line of text per QR code
    Shell,
}

#[derive(Subcommand, Debug)]
enum PrefsAction {
    /// Print the effective preferences
    Show,
    /// Print the preference file location
    Path,
    /// Restore the defaults
    Reset,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Text to encode
    text: Option<String>,

    /// Foreground color as #RRGGBB
    #[arg(long, value_name = "HEX", value_parser = ColorSpec::from_hex, conflicts_with_all = ["fg_white", "fg_hsb"])]
    fg: Option<ColorSpec>,

    /// Pure white foreground
    #[arg(long, conflicts_with = "fg_hsb")]
    fg_white: bool,

    /// Foreground as hue,brightness,opacity in [0, 1]
    #[arg(long, value_name = "H,B,A", value_parser = parse_hsb)]
    fg_hsb: Option<ColorSpec>,

    /// Background color as #RRGGBB
    #[arg(long, value_name = "HEX", value_parser = ColorSpec::from_hex, conflicts_with_all = ["bg_white", "bg_hsb"])]
    bg: Option<ColorSpec>,

    /// Pure white background
    #[arg(long, conflicts_with = "bg_hsb")]
    bg_white: bool,

    /// Background as hue,brightness,opacity in [0, 1]
    #[arg(long, value_name = "H,B,A", value_parser = parse_hsb)]
    bg_hsb: Option<ColorSpec>,

    /// Image width and height in pixels
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_SIZE.0,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_SIDE))
    )]
    size: u32,

    /// Error correction level
    #[arg(long, value_name = "L|M|Q|H", default_value_t = ECLevel::M)]
    ec: ECLevel,

    /// Save the image as PNG
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Copy the image to the clipboard
    #[arg(short, long)]
    copy: bool,

    /// Print a preview to the terminal, the default without --out or --copy
    #[arg(short, long)]
    print: bool,

    /// Store text and colors as the new defaults
    #[arg(long)]
    remember: bool,
}

impl GenerateArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(text) = &self.text {
            settings.text = text.clone();
        }

        let pick = |hex: Option<ColorSpec>, white: bool, hsb: Option<ColorSpec>| {
            hex.or(hsb).or(white.then_some(ColorSpec::WhiteOverride))
        };
        if let Some(fg) = pick(self.fg, self.fg_white, self.fg_hsb) {
            settings.fg = fg;
        }
        if let Some(bg) = pick(self.bg, self.bg_white, self.bg_hsb) {
            settings.bg = bg;
        }

        settings.size = (self.size, self.size);
        settings.ec_level = self.ec;
    }
}

fn parse_hsb(s: &str) -> Result<ColorSpec, String> {
    if !s.contains(',') {
        return Err(format!("expected hue,brightness[,opacity], got '{s}'"));
    }
    s.parse().map_err(|e: qrbar::QRError| e.to_string())
}

fn preference_file(path: Option<PathBuf>) -> Result<PreferenceFile> {
    match path {
        Some(path) => Ok(PreferenceFile::new(path)),
        None => PreferenceFile::default_location().context("Failed to locate preference file"),
    }
}

fn generate(args: GenerateArgs, store: PreferenceFile) -> Result<()> {
    let mut prefs = store.load_or_default();
    let mut settings = prefs.to_settings();
    args.apply(&mut settings);

    let img = regenerate(&settings).context("Failed to generate QR code")?;

    if args.print || (args.out.is_none() && !args.copy) {
        let grid = QrCodeEncoder::new(settings.ec_level).encode(&settings.text)?;
        print!("{}", to_terminal_string(&grid));
        io::stdout().flush()?;
    }

    let mut clipboard = SystemClipboard;
    if let Some(out) = args.out {
        let path = ensure_png_extension(out);
        export(&img, &ExportTarget::File(path.clone()), &mut clipboard)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        println!("Saved {}", path.display());
    }
    if args.copy {
        export(&img, &ExportTarget::Clipboard, &mut clipboard)?;
    }

    if args.remember {
        prefs.apply_settings(&settings);
        store.save(&prefs).context("Failed to save preferences")?;
        info!(path = %store.path().display(), "Remembered settings");
    }

    Ok(())
}

fn prefs(action: PrefsAction, store: PreferenceFile) -> Result<()> {
    match action {
        PrefsAction::Show => print!("{}", store.load_or_default().resolved().to_toml()?),
        PrefsAction::Path => println!("{}", store.path().display()),
        PrefsAction::Reset => {
            store.reset().context("Failed to reset preferences")?;
            println!("Preferences reset to defaults");
        }
    }
    Ok(())
}

fn shell(store: PreferenceFile) -> Result<()> {
    let prefs = store.load_or_default();
    let settings = prefs.to_settings();

    println!("Type text to encode, :quit to exit");
    let mut shell = Shell::new(settings, prefs, Some(store), SystemClipboard)?;
    shell.run(io::stdin().lock(), io::stdout().lock())?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "qrbar=debug" } else { "qrbar=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let store = preference_file(cli.prefs)?;
    match cli.command {
        Command::Generate(args) => generate(args, store),
        Command::Prefs { action } => prefs(action, store),
        Command::Shell => shell(store),
    }
}
