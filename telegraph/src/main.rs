#![deny(unused_crate_dependencies)]

use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use eyre::Result;
use libtelegraph::{
    GraphState,
    chart::{Axis, AxisRange, ChartBackend, Trace},
    config::GraphConfig,
    logs,
    message::Message,
    signals::SignalSpec,
    time_range::TimeRange,
    try_log_error,
    view_mode::ViewMode,
};
use tracing::{debug, error, info};

const DEFAULT_COLORS: [&str; 7] = [
    "#a7e47e", "#c52e2e", "#f3d54a", "#81a2be", "#b294bb", "#8abeb7", "#c5c8c6",
];

#[derive(clap::Parser, Default)]
#[command(version, about)]
struct Args {
    /// Signal to display, as `id[:display name[:color]]`, e.g. `BMS.soc:State of charge:#a7e47e`.
    /// Can be given multiple times.
    #[clap(long = "signal", short = 's', value_parser = parse_signal)]
    signals: Vec<SignalSpec>,

    /// Initial view mode: `live`, `live-scroll:<seconds>`, `zoom:<start>:<end>` or `show-all`
    #[clap(long, short, value_parser = parse_mode)]
    mode: Option<ViewMode>,

    /// Base URL of the dashboard backend, overrides the configuration
    #[clap(long)]
    server: Option<String>,

    #[clap(long)]
    /// Load previously saved state file
    state_file: Option<Utf8PathBuf>,

    #[clap(long)]
    /// Save the state to this file on exit
    save_state: Option<Utf8PathBuf>,

    /// Stop after this many seconds instead of running until interrupted
    #[clap(long)]
    duration: Option<f64>,

    /// Width of the imagined plot, sent to the server as downsampling hint
    #[clap(long, default_value_t = 1200)]
    viewport_width: u32,

    /// Seconds between data status reports
    #[clap(long, default_value_t = 5)]
    status_interval: u64,

    /// Use only the built-in configuration
    #[clap(long, action)]
    default_config: bool,
}

fn parse_signal(arg: &str) -> Result<SignalSpec, String> {
    let mut parts = arg.splitn(3, ':');
    let id = parts
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| format!("'{arg}' does not name a signal"))?;
    let display_name = parts.next().filter(|n| !n.is_empty()).unwrap_or(id);
    let color = parts.next().unwrap_or_default();
    Ok(SignalSpec {
        id: id.into(),
        display_name: display_name.to_string(),
        color: color.to_string(),
    })
}

fn parse_mode(arg: &str) -> Result<ViewMode, String> {
    let number = |s: &str| {
        s.parse::<f64>()
            .map_err(|e| format!("'{s}' is not a number: {e}"))
    };
    let parts: Vec<_> = arg.split(':').collect();
    let mode = match parts.as_slice() {
        ["live"] => ViewMode::Live,
        ["live-scroll", seconds] => ViewMode::LiveScroll {
            window_seconds: number(seconds)?,
        },
        ["zoom", start, end] => ViewMode::Zoom {
            start: number(start)?,
            end: number(end)?,
        },
        ["show-all"] => ViewMode::ShowAll,
        _ => return Err(format!("unknown view mode '{arg}'")),
    };
    mode.validate().map_err(|e| e.to_string())?;
    Ok(mode)
}

/// Chart that writes what it would paint to the log.
struct LogChart {
    viewport_width: u32,
    visible: Option<TimeRange>,
}

impl ChartBackend for LogChart {
    fn draw(&mut self, traces: &[Trace]) {
        let points: usize = traces.iter().map(|t| t.x.len()).sum();
        info!("Drawing {} traces with {points} points", traces.len());
        for trace in traces {
            if let (Some(t), Some(v)) = (trace.x.last(), trace.y.last()) {
                debug!("  {} ({}): {v} at {t:.3}", trace.display_name, trace.color);
            }
        }
    }

    fn set_axis_range(&mut self, axis: Axis, range: AxisRange) {
        match (axis, range) {
            (Axis::Time, AxisRange::Fixed(r)) => {
                if self.visible != Some(r) {
                    info!("Time axis {r}");
                }
                self.visible = Some(r);
            }
            (axis, range) => debug!("{axis} axis {range:?}"),
        }
    }

    fn visible_range(&self) -> Option<TimeRange> {
        self.visible
    }

    fn viewport_width(&self) -> u32 {
        self.viewport_width
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = GraphConfig::new(args.default_config)?;
    if let Some(server) = args.server {
        config.server.url = server;
    }
    let chart = LogChart {
        viewport_width: args.viewport_width,
        visible: None,
    };
    let mut state = GraphState::new_http(config, Box::new(chart));

    if let Some(file) = args.state_file {
        state.load_state(file);
        state.handle_async_messages();
    }
    for (i, mut spec) in args.signals.into_iter().enumerate() {
        if spec.color.is_empty() {
            spec.color = DEFAULT_COLORS[i % DEFAULT_COLORS.len()].to_string();
        }
        state.add_signal(spec.id, spec.display_name, spec.color);
    }
    if let Some(mode) = args.mode {
        state.update(Message::SetViewMode(mode));
    }
    if state.registry().is_empty() {
        info!("No signals selected, waiting for nothing. Use --signal to add one.");
    }

    let run_for = args
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(Duration::from_secs_f64);
    let deadline = tokio::time::sleep(run_for.unwrap_or(Duration::from_secs(3600)));
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut status_ticker =
        tokio::time::interval(Duration::from_secs(args.status_interval.max(1)));

    loop {
        tokio::select! {
            msg = state.next_message() => match msg {
                Some(msg) => state.update(msg),
                None => break,
            },
            _ = status_ticker.tick() => {
                match state.data_range() {
                    Some(range) => info!("{} | data range {range}", state.data_status()),
                    None => info!("{}", state.data_status()),
                }
            }
            _ = &mut deadline, if run_for.is_some() => break,
            res = &mut ctrl_c => {
                try_log_error!(res, "Failed to listen for Ctrl-C");
                info!("Interrupted");
                break;
            }
        }
    }

    if let Some(path) = args.save_state {
        state.save_state(path);
        while let Some(msg) = state.next_message().await {
            let done = matches!(msg, Message::StateSaved(_) | Message::Error(_));
            state.update(msg);
            if done {
                break;
            }
        }
    }
    state.stop_polling();
    Ok(())
}

fn main() -> Result<()> {
    simple_eyre::install()?;

    logs::start_logging()?;

    std::panic::set_hook(Box::new(panic_handler));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let args = Args::parse();
    runtime.block_on(run(args)).inspect_err(|e| error!("{e:#}"))
}

fn panic_handler(info: &std::panic::PanicHookInfo) {
    let backtrace = std::backtrace::Backtrace::force_capture();

    eprintln!();
    eprintln!("telegraph crashed due to a panic");
    eprintln!();

    let msg = if let Some(msg) = info.payload().downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = info.payload().downcast_ref::<String>() {
        msg.clone()
    } else {
        "<panic message not a string>".to_owned()
    };

    eprintln!("telegraph version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(location) = info.location() {
        eprintln!(
            "thread '{}' panicked at {}:{}:{}",
            std::thread::current().name().unwrap_or("unknown"),
            location.file(),
            location.line(),
            location.column(),
        );
    }
    eprintln!("  {msg}");
    eprintln!();
    eprintln!("backtrace:");
    eprintln!("{backtrace}");
}
