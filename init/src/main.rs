//! Entry point for the hostbridge container bootstrap agent.

#[cfg(not(target_os = "linux"))]
compile_error!("hostbridge-init is Linux-only; build with a Linux target");

#[cfg(target_os = "linux")]
mod bootstrap;
#[cfg(target_os = "linux")]
mod bridge;
#[cfg(target_os = "linux")]
mod command;
#[cfg(target_os = "linux")]
mod context;
#[cfg(target_os = "linux")]
mod exclusions;
#[cfg(target_os = "linux")]
mod identity;
#[cfg(target_os = "linux")]
mod packages;
#[cfg(all(test, target_os = "linux"))]
mod testing;

#[cfg(target_os = "linux")]
use bootstrap::Bootstrap;
#[cfg(target_os = "linux")]
use bridge::KernelMounter;
#[cfg(target_os = "linux")]
use clap::error::ErrorKind;
#[cfg(target_os = "linux")]
use clap::Parser;
#[cfg(target_os = "linux")]
use command::SystemRunner;
#[cfg(target_os = "linux")]
use context::ExecutionContext;
#[cfg(target_os = "linux")]
use hostbridge_shared::constants::{env, exit};
#[cfg(target_os = "linux")]
use hostbridge_shared::errors::{HostbridgeError, HostbridgeResult};
#[cfg(target_os = "linux")]
use hostbridge_shared::RootLayout;
#[cfg(target_os = "linux")]
use std::path::PathBuf;
#[cfg(target_os = "linux")]
use std::process::ExitCode;
#[cfg(target_os = "linux")]
use tracing::info;

/// hostbridge init - turns a fresh container into a host-integrated login
/// environment
#[cfg(target_os = "linux")]
#[derive(Parser, Debug)]
#[command(author, version, about = "hostbridge container bootstrap agent")]
struct InitArgs {
    /// Name of the user to reconcile
    #[arg(short = 'u', long = "user", required_unless_present = "upgrade")]
    user: Option<String>,

    /// Numeric user id
    #[arg(long, required_unless_present = "upgrade")]
    uid: Option<u32>,

    /// Numeric group id
    #[arg(long, required_unless_present = "upgrade")]
    gid: Option<u32>,

    /// Home directory of the user
    #[arg(short = 'd', long, required_unless_present = "upgrade")]
    home: Option<PathBuf>,

    /// Exec /sbin/init once bootstrap is done instead of idling
    #[arg(short = 'I', long)]
    init: bool,

    /// Upgrade the container's packages and exit
    #[arg(short = 'U', long)]
    upgrade: bool,

    /// Shell command run before dependencies are installed
    #[arg(long = "pre-init-hooks", value_name = "CMD")]
    pre_init_hooks: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Login shell of the host user
    #[arg(long, env = env::SHELL, hide = true)]
    shell: Option<PathBuf>,

    /// Container root prefix
    #[arg(long, env = env::ROOT, default_value = "/", hide = true)]
    root: PathBuf,

    /// Container runtime name, as exported by the runtime
    #[arg(long = "container-runtime", env = env::CONTAINER, hide = true)]
    runtime_hint: Option<String>,

    /// Command run after all bridging, before the terminal phase
    ///
    /// Example:
    ///   hostbridge-init -u alice --uid 1000 --gid 1000 -d /home/alice -- touch /tmp/ready
    #[arg(last = true, value_name = "INIT_HOOK")]
    init_hook: Vec<String>,
}

#[cfg(target_os = "linux")]
impl InitArgs {
    fn into_context(self) -> HostbridgeResult<ExecutionContext> {
        let missing = |name: &str| HostbridgeError::MissingArgument(name.to_string());
        let mut ctx = ExecutionContext::new(
            self.user.ok_or_else(|| missing("--user"))?,
            self.uid.ok_or_else(|| missing("--uid"))?,
            self.gid.ok_or_else(|| missing("--gid"))?,
            self.home.ok_or_else(|| missing("--home"))?,
            self.shell,
        );
        ctx.init = self.init;
        ctx.pre_init_hook = self.pre_init_hooks.filter(|h| !h.trim().is_empty());
        let init_hook = self.init_hook.join(" ");
        ctx.init_hook = Some(init_hook).filter(|h| !h.trim().is_empty());
        ctx.runtime_hint = self.runtime_hint;
        Ok(ctx)
    }
}

#[cfg(target_os = "linux")]
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Set panic hook to ensure we see panics
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("[PANIC] hostbridge-init panicked: {}", panic_info);
        std::process::exit(exit::FAILURE);
    }));

    let args = match InitArgs::try_parse() {
        Ok(args) => args,
        Err(e) => return argument_error(e),
    };

    // RUST_LOG wins; otherwise warn, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "warn" };
    if let Err(e) = tracing_subscriber::fmt()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .try_init()
    {
        eprintln!("[ERROR] Failed to initialize tracing: {}", e);
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code(e.exit_code())
        }
    }
}

#[cfg(target_os = "linux")]
async fn run(args: InitArgs) -> HostbridgeResult<()> {
    let layout = RootLayout::new(&args.root);
    let runner = SystemRunner;
    let mounter = KernelMounter;

    if args.upgrade {
        let backend =
            bootstrap::upgrade(&layout, args.runtime_hint.as_deref(), &runner).await?;
        info!("Upgraded container packages with {}", backend);
        return Ok(());
    }

    let ctx = args.into_context()?;
    info!(
        "Bootstrapping {} ({}:{}) under {}",
        ctx.username,
        ctx.uid,
        ctx.gid,
        layout.root().display()
    );

    let mut bootstrap = Bootstrap::new(ctx, layout.clone(), &runner, &mounter);
    let action = bootstrap.run(&mut std::io::stdout()).await?;
    action.enter(&layout, &mounter).await
}

/// Help and version exit 0, a missing identity argument exits 2, any
/// other parse error exits 1.
#[cfg(target_os = "linux")]
fn argument_error(e: clap::Error) -> ExitCode {
    let code = match e.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => exit::SUCCESS,
        ErrorKind::MissingRequiredArgument => exit::MISSING_ARGUMENT,
        _ => exit::INVALID_ARGUMENT,
    };
    let _ = e.print();
    exit_code(code)
}

#[cfg(target_os = "linux")]
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
