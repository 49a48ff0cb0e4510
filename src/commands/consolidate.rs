//! Consolidation commands.

use super::{concept_service, parse_domain};
use anyhow::Context;
use clap::Args;
use mnemo::MnemoConfig;
use mnemo::models::DomainContext;
use mnemo::services::{ConsolidationManager, KnowledgeWriter};
use mnemo::storage::{EpisodicStore, InMemoryEpisodicStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Arguments shared by `consolidate` and `watch`.
#[derive(Args, Debug, Clone)]
pub struct ConsolidateArgs {
    /// JSON file of episodic memories.
    #[arg(short, long)]
    input: PathBuf,

    /// Only admit knowledge that may flow into this domain.
    #[arg(long)]
    target_domain: Option<String>,

    /// Knowledge vertical of the target domain.
    #[arg(long, requires = "target_domain")]
    vertical: Option<String>,

    /// Leave the input file untouched instead of saving consolidated flags.
    #[arg(long)]
    no_save: bool,
}

impl ConsolidateArgs {
    fn target(&self) -> anyhow::Result<Option<DomainContext>> {
        let Some(domain) = &self.target_domain else {
            return Ok(None);
        };
        let mut target = DomainContext::new(parse_domain(domain)?);
        if let Some(vertical) = &self.vertical {
            target = target.with_vertical(vertical.clone());
        }
        Ok(Some(target))
    }
}

struct Session {
    store: Arc<InMemoryEpisodicStore>,
    manager: ConsolidationManager,
    writer: KnowledgeWriter,
    target: Option<DomainContext>,
    args: ConsolidateArgs,
}

impl Session {
    fn open(config: &MnemoConfig, args: ConsolidateArgs) -> anyhow::Result<Self> {
        let store = Arc::new(
            InMemoryEpisodicStore::from_json_file(&args.input)
                .with_context(|| format!("loading memories from {}", args.input.display()))?,
        );
        let manager = ConsolidationManager::with_chunker(
            Arc::clone(&store) as Arc<dyn EpisodicStore>,
            config.consolidation.clone(),
            config.chunking,
        );
        Ok(Self {
            writer: KnowledgeWriter::new(concept_service(config)?),
            target: args.target()?,
            store,
            manager,
            args,
        })
    }

    fn run_cycle(&mut self) -> anyhow::Result<()> {
        let stats = self.manager.consolidate(&self.writer, self.target.as_ref())?;
        println!("{}", stats.summary());

        if !self.args.no_save && stats.marked_consolidated > 0 {
            self.store
                .save_json_file(&self.args.input)
                .with_context(|| format!("saving memories to {}", self.args.input.display()))?;
        }
        Ok(())
    }
}

/// Consolidate command.
pub fn cmd_consolidate(
    config: &MnemoConfig,
    args: &ConsolidateArgs,
    dry_run: bool,
) -> anyhow::Result<()> {
    if dry_run {
        let store = InMemoryEpisodicStore::from_json_file(&args.input)
            .with_context(|| format!("loading memories from {}", args.input.display()))?;
        let manager = ConsolidationManager::with_chunker(
            Arc::new(InMemoryEpisodicStore::new()),
            config.consolidation.clone(),
            config.chunking,
        );
        let candidates = store.get_consolidation_candidates()?;
        let knowledge = manager.extract_knowledge(&candidates, args.target()?.as_ref());
        println!("{}", serde_json::to_string_pretty(&knowledge)?);
        return Ok(());
    }

    Session::open(config, args.clone())?.run_cycle()
}

/// Watch command.
///
/// Checks the triggers every `tick_secs` and runs a cycle on the blocking
/// pool whenever one fires. Stops on Ctrl-C or after `max_cycles` cycles.
pub async fn cmd_watch(
    config: MnemoConfig,
    args: ConsolidateArgs,
    tick_secs: u64,
    max_cycles: Option<usize>,
) -> anyhow::Result<()> {
    let mut session = Some(Session::open(&config, args)?);
    let mut ticker = tokio::time::interval(Duration::from_secs(tick_secs.max(1)));
    let mut cycles = 0usize;

    tracing::info!(
        tick_secs,
        interval_secs = config.consolidation.interval_secs,
        "Watching for consolidation triggers"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping watch");
                return Ok(());
            },
        }

        let Some(mut current) = session.take() else {
            return Ok(());
        };
        let (returned, ran) = tokio::task::spawn_blocking(move || {
            if !current.manager.should_consolidate() {
                return (current, Ok(false));
            }
            let result = current.run_cycle().map(|()| true);
            (current, result)
        })
        .await
        .context("consolidation task panicked")?;
        session = Some(returned);

        match ran {
            Ok(true) => cycles += 1,
            Ok(false) => {},
            Err(e) => tracing::error!(error = %format!("{e:#}"), "Consolidation cycle failed"),
        }

        if max_cycles.is_some_and(|max| cycles >= max) {
            return Ok(());
        }
    }
}
