use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use candle_core::Device;
use clap::{Parser, Subcommand};

use aecode_common::{ChannelCodeConfig, MessageSource};
use aecode_train::{Session, SweepReport};

#[derive(Parser, Debug)]
#[command(name = "aecode", about = "Train and evaluate learned channel codes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train an encoder/decoder pair with alternating optimisation.
    Train(TrainArgs),
    /// BER/BLER sweep over an SNR grid for a saved model.
    Test(TestArgs),
    /// Write the default config to a file.
    InitConfig(InitConfigArgs),
}

// ── Train ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct TrainArgs {
    /// Created with defaults if missing.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    #[arg(long, default_value = "checkpoints")]
    output_dir: PathBuf,
    /// Overrides `num_epoch` from the config.
    #[arg(long)]
    num_epoch: Option<usize>,
    /// Overrides `seed` from the config.
    #[arg(long)]
    seed: Option<u64>,
    /// Save a checkpoint every N outer epochs (0 = only the final model).
    #[arg(long, default_value_t = 0)]
    save_every: usize,
    /// Skip the SNR sweep after training.
    #[arg(long)]
    no_test: bool,
    #[arg(long)]
    cpu: bool,
}

// ── Test ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct TestArgs {
    /// Directory written by `train` (or one of its checkpoints).
    #[arg(long)]
    model_dir: PathBuf,
    #[arg(long)]
    snr_test_start: Option<f64>,
    #[arg(long)]
    snr_test_end: Option<f64>,
    #[arg(long)]
    snr_points: Option<usize>,
    /// Print BER per block position.
    #[arg(long)]
    print_pos_ber: bool,
    /// Print code power per block position.
    #[arg(long)]
    print_pos_power: bool,
    /// Transmit the all-zero codeword instead of random messages.
    #[arg(long)]
    all_zeros: bool,
    /// Also estimate mutual information (bits) at this SNR.
    #[arg(long)]
    mutual_info: Option<f64>,
    /// Where to write the sweep as JSON (default: <model_dir>/sweep.json).
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    cpu: bool,
}

#[derive(Parser, Debug)]
struct InitConfigArgs {
    #[arg(long, default_value = "config.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Train(args) => cmd_train(args),
        Command::Test(args) => cmd_test(args),
        Command::InitConfig(args) => cmd_init_config(args),
    }
}

fn device(cpu: bool) -> Result<Device> {
    if cpu {
        Ok(Device::Cpu)
    } else {
        Ok(Device::cuda_if_available(0)?)
    }
}

// ── Command implementations ────────────────────────────────────────────────────

fn cmd_train(args: TrainArgs) -> Result<()> {
    let mut config = if args.config.exists() {
        ChannelCodeConfig::load(&args.config)?
    } else {
        let default = ChannelCodeConfig::default();
        default.save(&args.config)?;
        eprintln!("Created default config at {}", args.config.display());
        default
    };
    if let Some(n) = args.num_epoch {
        config.num_epoch = n;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let num_epoch = config.num_epoch;

    let mut session = Session::new(config, device(args.cpu)?)?;
    std::fs::create_dir_all(&args.output_dir)?;

    let mut metrics_file = std::fs::File::create(args.output_dir.join("metrics.csv"))?;
    writeln!(
        metrics_file,
        "epoch,enc_loss,dec_loss,val_bce,val_custom_loss,val_ber"
    )?;

    session.run(num_epoch, |session, summary| {
        let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        writeln!(
            metrics_file,
            "{},{},{},{},{},{}",
            summary.epoch,
            opt(summary.enc_loss),
            opt(summary.dec_loss),
            summary.validation.bce_loss,
            summary.validation.custom_loss,
            summary.validation.ber
        )?;
        metrics_file.flush()?;
        if args.save_every > 0 && summary.epoch % args.save_every == 0 {
            let path = session.save_checkpoint(&args.output_dir)?;
            tracing::info!(path = %path.display(), "checkpoint saved");
        }
        Ok(())
    })?;

    let path = session.save(&args.output_dir)?;
    eprintln!("Model saved to {}", path.display());

    if !args.no_test {
        let report = session.test()?;
        write_report(&report, &args.output_dir.join("sweep.json"))?;
    }
    Ok(())
}

fn cmd_test(args: TestArgs) -> Result<()> {
    let mut session = Session::load(&args.model_dir, device(args.cpu)?, |c| {
        if let Some(v) = args.snr_test_start {
            c.snr_test_start = v;
        }
        if let Some(v) = args.snr_test_end {
            c.snr_test_end = v;
        }
        if let Some(v) = args.snr_points {
            c.snr_points = v;
        }
        c.print_pos_ber |= args.print_pos_ber;
        c.print_pos_power |= args.print_pos_power;
    })?;

    if args.all_zeros {
        session
            .harness_mut()
            .set_message_source(MessageSource::AllZeros);
    }

    let report = session.test()?;
    let output = args
        .output
        .unwrap_or_else(|| args.model_dir.join("sweep.json"));
    write_report(&report, &output)?;

    if let Some(snr) = args.mutual_info {
        let mi = session.mutual_info(snr)?;
        tracing::info!(snr, mutual_info_bits = mi, "mutual information");
    }
    Ok(())
}

fn cmd_init_config(args: InitConfigArgs) -> Result<()> {
    ChannelCodeConfig::default().save(&args.output)?;
    eprintln!("Wrote default config to {}", args.output.display());
    Ok(())
}

fn write_report(report: &SweepReport, path: &std::path::Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    eprintln!("Sweep written to {}", path.display());
    Ok(())
}
