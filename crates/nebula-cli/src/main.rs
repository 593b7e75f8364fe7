mod animator;
mod backup;
mod feed;
mod pointer;
mod remote;
mod server;
mod state;
mod term;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use nebula_core::favorites::{by_recency, remix_metadata, signal_metadata};
use nebula_core::time::now_unix_ms;
use nebula_core::{FavoriteKind, Interaction, KindFilter, Toggle, Viewport, collide};
use nebula_store::json_bridge::export_path;
use nebula_store::{Config, DataPaths, PersistentFavorites};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::animator::{FieldView, ViewSettings};
use crate::feed::{Feed, LOCAL_POLL};
use crate::pointer::{PointerScript, parse_cell};
use crate::remote::RemoteFeed;
use crate::server::FeedServer;
use crate::state::{SharedVault, Vault};
use crate::term::{ResizeEvents, TerminalCanvas, terminal_size};

#[derive(Parser)]
#[command(name = "nebula", about = "Idea Nebula: a shared field of anonymous fragments")]
struct Cli {
    /// Data directory (default: $NEBULA_DATA_DIR, then ~/.idea-nebula)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of a remote feed server, instead of the local log
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the local fragment log over HTTP
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        listen: Option<String>,
    },

    /// Transmit a fragment into the void
    Submit {
        /// Fragment text
        text: String,
    },

    /// Collide 3-5 random fragments into a remix
    Collide {
        /// Star the remix
        #[arg(long)]
        favorite: bool,
    },

    /// Animate the field in the terminal
    Watch {
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,

        /// Highlight fragments containing this text
        #[arg(long)]
        search: Option<String>,

        /// Select a fragment by id
        #[arg(long)]
        select: Option<String>,

        /// Run one collision and draw its constellation
        #[arg(long)]
        collide: bool,

        /// Click the field at COLUMN,ROW; repeat to click in order
        #[arg(long, value_name = "COLUMN,ROW", value_parser = parse_cell)]
        click: Vec<(f64, f64)>,

        /// Leave the pointer resting at COLUMN,ROW
        #[arg(long, value_name = "COLUMN,ROW", value_parser = parse_cell)]
        pointer: Option<(f64, f64)>,

        #[arg(long)]
        width: Option<u16>,

        #[arg(long)]
        height: Option<u16>,
    },

    /// Manage starred collisions and signals
    Favorites {
        #[command(subcommand)]
        action: FavoritesCommand,
    },

    /// Show feed and favorites statistics
    Stats,
}

#[derive(Subcommand)]
enum FavoritesCommand {
    /// List favorites, newest first
    List {
        /// collision or signal
        #[arg(long)]
        kind: Option<FavoriteKind>,

        #[arg(long)]
        search: Option<String>,
    },

    /// Star a text, or unstar it if already starred
    Toggle {
        text: String,

        #[arg(long, default_value = "collision")]
        kind: FavoriteKind,
    },

    /// Star or unstar a single fragment from the feed
    Signal {
        /// Fragment id
        id: String,
    },

    /// Write all favorites to a JSON file
    Export {
        /// File or directory (default: nebula-favorites-YYYY-MM-DD.json)
        path: Option<PathBuf>,
    },

    /// Merge favorites from a JSON file
    Import { path: PathBuf },

    /// Remove the favorites matching a filter
    Clear {
        #[arg(long)]
        kind: Option<FavoriteKind>,

        #[arg(long)]
        search: Option<String>,

        /// Remove every favorite
        #[arg(long, conflicts_with_all = ["kind", "search"])]
        all: bool,
    },

    /// Snapshot favorites into the backup slot now
    Backup {
        /// Delete the stored backup instead of writing one
        #[arg(long)]
        discard: bool,
    },

    /// Replace favorites with the last backup
    Restore,
}

fn data_paths(cli: &Cli) -> DataPaths {
    let base = cli
        .data_dir
        .clone()
        .or_else(|| std::env::var("NEBULA_DATA_DIR").ok().map(PathBuf::from));
    DataPaths::resolve(base.as_deref())
}

fn load_config(paths: &DataPaths) -> Result<Config> {
    Config::load(&paths.config)
        .with_context(|| format!("failed to load {}", paths.config.display()))
}

fn open_vault(paths: &DataPaths) -> Result<SharedVault> {
    Ok(Vault::open(paths)?.shared())
}

fn open_feed(cli: &Cli, config: &Config, vault: &SharedVault) -> Result<Feed> {
    match cli.remote.as_deref().or(config.remote.as_deref()) {
        Some(url) => {
            tracing::debug!("using remote feed at {url}");
            Ok(Feed::Remote(Arc::new(RemoteFeed::new(url)?)))
        }
        None => Ok(Feed::Local {
            vault: vault.clone(),
            limit: config.feed_limit(),
        }),
    }
}

fn kind_filter(kind: Option<FavoriteKind>) -> KindFilter {
    kind.map_or(KindFilter::All, KindFilter::Only)
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = data_paths(&cli);
    let config = load_config(&paths)?;

    match &cli.command {
        Commands::Serve { listen } => cmd_serve(&paths, &config, listen.as_deref()).await,
        Commands::Submit { text } => cmd_submit(&cli, &paths, &config, text).await,
        Commands::Collide { favorite } => cmd_collide(&cli, &paths, &config, *favorite).await,
        Commands::Watch {
            frames,
            search,
            select,
            collide,
            click,
            pointer,
            width,
            height,
        } => {
            let opts = WatchOptions {
                frames: *frames,
                search: search.clone(),
                select: select.clone(),
                collide: *collide,
                pointer: PointerScript {
                    clicks: click.clone(),
                    pointer: *pointer,
                },
                size: width.zip(*height),
            };
            cmd_watch(&cli, &paths, &config, opts).await
        }
        Commands::Favorites { action } => cmd_favorites(&cli, &paths, &config, action).await,
        Commands::Stats => cmd_stats(&paths).await,
    }
}

async fn cmd_serve(paths: &DataPaths, config: &Config, listen: Option<&str>) -> Result<()> {
    let vault = open_vault(paths)?;
    let shutdown = CancellationToken::new();
    let server = FeedServer::new(vault.clone(), config.feed_limit(), shutdown.clone()).await?;

    let addr = listen.unwrap_or(config.listen.as_str());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener.local_addr().context("failed to read bound address")?;
    let signals = shutdown_signal()?;
    tracing::info!("serving fragments from {}", paths.database.display());
    println!("listening on http://{local}");

    let backup = backup::spawn_backup(
        vault,
        Duration::from_secs(config.backup_interval_secs),
        shutdown.clone(),
    );
    let poll = server.spawn_log_poll(LOCAL_POLL);

    // Open SSE streams hold graceful shutdown open until the token fires.
    let token = shutdown.clone();
    axum::serve(listener, server.router())
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signals => tracing::info!("shutdown signal received"),
                _ = token.cancelled() => {}
            }
            token.cancel();
        })
        .await
        .context("feed server failed")?;

    shutdown.cancel();
    backup.await.context("backup task panicked")?;
    poll.await.context("log poll panicked")?;
    server.checkpoint_wal().await;
    Ok(())
}

/// SIGINT or SIGTERM. Handlers are installed before this returns, so a
/// signal arriving right after startup is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut interrupt = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
}

async fn cmd_submit(cli: &Cli, paths: &DataPaths, config: &Config, text: &str) -> Result<()> {
    let vault = open_vault(paths)?;
    let feed = open_feed(cli, config, &vault)?;
    if let Feed::Remote(remote) = &feed {
        remote.session().await?;
    }
    let fragment = feed.submit(text).await?;
    println!("transmitted {}", fragment.id);
    Ok(())
}

async fn cmd_collide(cli: &Cli, paths: &DataPaths, config: &Config, favorite: bool) -> Result<()> {
    let vault = open_vault(paths)?;
    let feed = open_feed(cli, config, &vault)?;
    let snapshot = feed.snapshot().await?;

    let mut rng = SmallRng::from_os_rng();
    let Some(result) = collide(&snapshot, &mut rng) else {
        bail!(
            "a collision needs at least 3 fragments, the field has {}",
            snapshot.len()
        );
    };

    let text = result.text();
    println!("{text}");
    println!();
    println!("sources: {}", result.source_ids.join(", "));

    if favorite {
        let mut guard = vault.lock().await;
        let Vault { store, favorites } = &mut *guard;
        if let Some(existing) = favorites.get().get_by_text(&text) {
            println!("already starred on {}", existing.date);
        } else {
            favorites.toggle(
                store,
                &text,
                FavoriteKind::Collision,
                remix_metadata(),
                now_unix_ms(),
            )?;
            println!("starred");
        }
    }
    Ok(())
}

struct WatchOptions {
    frames: Option<u64>,
    search: Option<String>,
    select: Option<String>,
    collide: bool,
    pointer: PointerScript,
    size: Option<(u16, u16)>,
}

async fn cmd_watch(cli: &Cli, paths: &DataPaths, config: &Config, opts: WatchOptions) -> Result<()> {
    let vault = open_vault(paths)?;
    let feed = open_feed(cli, config, &vault)?;
    let initial = feed.snapshot().await?;

    let tty = std::io::stdout().is_terminal();
    let fixed = opts
        .size
        .map(|(w, h)| Viewport::new(f64::from(w), f64::from(h)));
    let viewport = fixed
        .or_else(|| tty.then(terminal_size).flatten())
        .unwrap_or_else(|| config.viewport.into());

    let mut interaction = Interaction {
        search: opts.search.unwrap_or_default(),
        selected: opts.select,
        ..Default::default()
    };
    let remix = if opts.collide {
        let remix = collide(&initial, &mut SmallRng::from_os_rng());
        match &remix {
            Some(result) => interaction.show_remix(result),
            None => tracing::warn!("not enough fragments to collide"),
        }
        remix
    } else {
        None
    };
    opts.pointer.replay(&mut interaction, &initial, viewport);

    let (feed_tx, feed_rx) = watch::channel(Arc::new(initial));
    let latest = feed_rx.clone();
    let (ix_tx, ix_rx) = watch::channel(interaction);
    let token = CancellationToken::new();
    let subscription = feed.subscribe(feed_tx, token.clone());

    let settings = ViewSettings {
        policy: config.glimmer_policy(),
        max_frames: opts.frames,
        ..ViewSettings::at_frame_rate(config.frame_rate)
    };
    let mut view = FieldView::new(TerminalCanvas::new(viewport, tty), feed_rx, ix_rx, settings);

    if tty {
        print!("\x1b[2J\x1b[?25l");
    }
    view.mount(viewport).await?;
    if opts.frames.is_some() {
        view.finished().await?;
    } else {
        let mut resizes = ResizeEvents::new();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = resizes.next() => {
                    if fixed.is_none() && let Some(vp) = terminal_size() {
                        let snapshot = latest.borrow().clone();
                        ix_tx.send_modify(|ix| opts.pointer.rehover(ix, &snapshot, vp));
                        view.resize(vp).await?;
                    }
                }
            }
        }
    }
    view.unmount().await?;
    if tty {
        print!("\x1b[?25h");
    }

    token.cancel();
    subscription.await.context("feed subscription panicked")?;

    if let Some(result) = remix {
        println!("{}", result.text());
    }
    tracing::debug!(frames = view.frames(), "watch finished");
    Ok(())
}

async fn cmd_favorites(
    cli: &Cli,
    paths: &DataPaths,
    config: &Config,
    action: &FavoritesCommand,
) -> Result<()> {
    let vault = open_vault(paths)?;
    let now = now_unix_ms();

    match action {
        FavoritesCommand::List { kind, search } => {
            let guard = vault.lock().await;
            let set = guard.favorites.get();
            let shown = by_recency(set.filter(kind_filter(*kind), search.as_deref().unwrap_or("")));
            if shown.is_empty() {
                println!("(no favorites)");
                return Ok(());
            }
            for entry in &shown {
                println!(
                    "{}  [{}]  {}  ({} words)",
                    entry.id,
                    entry.kind,
                    entry.date,
                    entry.word_count()
                );
                for line in entry.text.lines() {
                    println!("    {line}");
                }
            }
            println!("{} of {} favorites", shown.len(), set.len());
        }

        FavoritesCommand::Toggle { text, kind } => {
            let mut guard = vault.lock().await;
            let Vault { store, favorites } = &mut *guard;
            let outcome = favorites.toggle(store, text, *kind, serde_json::Map::new(), now)?;
            print_toggle(outcome);
        }

        FavoritesCommand::Signal { id } => {
            let feed = open_feed(cli, config, &vault)?;
            let snapshot = feed.snapshot().await?;
            let Some(fragment) = snapshot.iter().find(|f| &f.id == id) else {
                bail!("no fragment with id {id} in the field");
            };
            let mut guard = vault.lock().await;
            let Vault { store, favorites } = &mut *guard;
            let outcome = favorites.toggle(
                store,
                &fragment.content,
                FavoriteKind::Signal,
                signal_metadata(&fragment.id),
                now,
            )?;
            print_toggle(outcome);
        }

        FavoritesCommand::Export { path } => {
            let guard = vault.lock().await;
            let target = export_path(path.as_deref(), now);
            guard.favorites.export_file(&target)?;
            println!(
                "exported {} favorites to {}",
                guard.favorites.get().len(),
                target.display()
            );
        }

        FavoritesCommand::Import { path } => {
            let mut guard = vault.lock().await;
            let Vault { store, favorites } = &mut *guard;
            let report = favorites
                .import_file(store, path, now)
                .with_context(|| format!("failed to import {}", path.display()))?;
            println!(
                "imported {} of {} ({} skipped)",
                report.added, report.received, report.skipped
            );
        }

        FavoritesCommand::Clear { kind, search, all } => {
            let mut guard = vault.lock().await;
            let Vault { store, favorites } = &mut *guard;
            let removed = if *all {
                favorites.clear_all(store)?
            } else {
                if kind.is_none() && search.is_none() {
                    bail!("nothing selected: pass --kind, --search or --all");
                }
                let ids: Vec<String> = favorites
                    .get()
                    .filter(kind_filter(*kind), search.as_deref().unwrap_or(""))
                    .into_iter()
                    .map(|e| e.id.clone())
                    .collect();
                favorites.clear(store, &ids)?
            };
            println!("removed {removed} favorites");
        }

        FavoritesCommand::Backup { discard: true } => {
            let guard = vault.lock().await;
            if PersistentFavorites::discard_backup(&guard.store)? {
                println!("backup discarded");
            } else {
                println!("no backup found");
            }
        }

        FavoritesCommand::Backup { discard: false } => {
            let mut guard = vault.lock().await;
            let Vault { store, favorites } = &mut *guard;
            match favorites.backup(store, now)? {
                Some(backup) => println!("backed up {} favorites", backup.count),
                None => println!("nothing to back up"),
            }
        }

        FavoritesCommand::Restore => {
            let mut guard = vault.lock().await;
            let Vault { store, favorites } = &mut *guard;
            match favorites.restore_backup(store)? {
                Some(count) => println!("restored {count} favorites"),
                None => println!("no backup found"),
            }
        }
    }
    Ok(())
}

fn print_toggle(outcome: Toggle) {
    match outcome {
        Toggle::Added => println!("starred"),
        Toggle::Removed => println!("unstarred"),
        Toggle::Ignored => println!("nothing to star"),
    }
}

async fn cmd_stats(paths: &DataPaths) -> Result<()> {
    let vault = open_vault(paths)?;
    let guard = vault.lock().await;
    let fragments = guard
        .store
        .fragment_count()
        .context("failed to count fragments")?;
    let stats = guard.favorites.get().stats();
    let backup = PersistentFavorites::load_backup(&guard.store)?;
    let schema = guard.store.schema_version()?;

    println!("fragments:  {fragments}");
    println!(
        "favorites:  {} ({} collisions, {} signals)",
        stats.total, stats.collisions, stats.signals
    );
    match backup {
        Some(b) => println!("backup:     {} favorites at {}", b.count, b.timestamp),
        None => println!("backup:     none"),
    }
    if let Some(v) = schema {
        println!("schema:     v{v}");
    }
    println!("data dir:   {}", paths.base.display());
    Ok(())
}
