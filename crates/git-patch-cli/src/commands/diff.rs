use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use git_patch::{
    build_in_process, ActionPrinter, CheckoutRules, DispatcherConfig, NoListener, PatchAction,
    PatchDispatcher, PatchSettings, PatchWriter, RecordingSink, RootSettings,
};
use git_submodule::{LocalFetcher, SubmodulePolicy};

use crate::Cli;

#[derive(Args)]
pub struct DiffArgs {
    /// Repository URL or path of a bare repository
    repository: String,

    /// Revision the patch is applied to; a clean patch when omitted
    #[arg(long)]
    from: Option<String>,

    /// Revision the patch leads to
    #[arg(long)]
    to: String,

    /// Checkout rule, e.g. `+:src=>out` or `-:docs` (repeatable)
    #[arg(short = 'r', long = "rule")]
    rules: Vec<String>,

    /// Submodule policy: IGNORE, CHECKOUT, NON_RECURSIVE_CHECKOUT, or one of
    /// the last two with an _IGNORING_ERRORS suffix
    #[arg(long, default_value = "CHECKOUT")]
    submodules: String,

    /// Directory holding repository mirrors
    #[arg(long)]
    caches_dir: Option<PathBuf>,

    /// Convert LF to CRLF in text files
    #[arg(long)]
    auto_crlf: bool,

    /// Write the binary patch stream to <file> instead of listing actions
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Build the patch in a child process
    #[arg(long)]
    separate_process: bool,

    /// Log every visited file
    #[arg(long)]
    verbose_tree_walk: bool,
}

fn settings(args: &DiffArgs) -> Result<PatchSettings> {
    let policy: SubmodulePolicy = args.submodules.parse()?;
    let caches_dir = match &args.caches_dir {
        Some(dir) => dir.clone(),
        None => std::env::temp_dir().join("gitpatch-caches"),
    };
    Ok(PatchSettings {
        from_revision: args.from.clone(),
        to_revision: args.to.clone(),
        rules: if args.rules.is_empty() {
            CheckoutRules::include_all()
        } else {
            CheckoutRules::parse(&args.rules.join("\n"))?
        },
        caches_dir,
        patch_file: args.output.clone().unwrap_or_default(),
        uploaded_key: None,
        verbose_tree_walk: args.verbose_tree_walk,
        debug: false,
        root: RootSettings {
            url: args.repository.clone(),
            policy,
            auto_crlf: args.auto_crlf,
            ..RootSettings::default()
        },
    })
}

fn print_actions(actions: &[PatchAction], out: &mut impl Write) -> io::Result<()> {
    for action in actions {
        match action {
            PatchAction::CreateOrChange {
                path, mode, content, ..
            } => match mode {
                Some(mode) => writeln!(out, "M {path} ({} bytes, {mode})", content.len())?,
                None => writeln!(out, "M {path} ({} bytes)", content.len())?,
            },
            PatchAction::DeleteFile(path) => writeln!(out, "D {path}")?,
            PatchAction::DeleteDirectory(path) => writeln!(out, "D {path}/")?,
        }
    }
    Ok(())
}

pub fn run(args: &DiffArgs, cli: &Cli) -> Result<i32> {
    crate::init_logging(cli.verbose);
    let settings = settings(args)?;

    if args.separate_process {
        let dispatcher = PatchDispatcher::new(DispatcherConfig::new(std::env::current_exe()?));
        return match &args.output {
            Some(path) => {
                let mut writer = PatchWriter::new(BufWriter::new(File::create(path)?))?;
                dispatcher.build(&settings, &mut writer, &mut NoListener)?;
                writer.finish()?;
                Ok(0)
            }
            None => {
                let mut sink = RecordingSink::new();
                dispatcher.build(&settings, &mut sink, &mut NoListener)?;
                print_actions(&sink.actions, &mut io::stdout().lock())?;
                Ok(0)
            }
        };
    }

    let fetcher = Arc::new(LocalFetcher::new());
    match &args.output {
        Some(path) => {
            let mut writer = PatchWriter::new(BufWriter::new(File::create(path)?))?;
            let stdout = io::stdout();
            let mut printer = ActionPrinter::new(stdout.lock());
            build_in_process(&settings, fetcher, &mut writer, &mut printer)?;
            writer.finish()?;
        }
        None => {
            let mut sink = RecordingSink::new();
            build_in_process(&settings, fetcher, &mut sink, &mut NoListener)?;
            print_actions(&sink.actions, &mut io::stdout().lock())?;
        }
    }
    Ok(0)
}
