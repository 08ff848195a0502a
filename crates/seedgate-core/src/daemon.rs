//! Wires contributors, the aggregate and the control loop together and runs
//! them as one task set until cancelled.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::aggregate::ReductionAggregate;
use crate::clients::{ClientAdapter, TorrentClient};
use crate::config::SeedgateConfig;
use crate::control::{ControlLoop, SpeedBounds};
use crate::media::{BandwidthContributor, MediaServer};
use crate::schedule::ScheduleContributor;

pub struct Daemon {
    aggregate: Arc<ReductionAggregate>,
    control: ControlLoop,
    schedules: Vec<ScheduleContributor>,
    media: Vec<BandwidthContributor<MediaServer>>,
}

impl Daemon {
    pub fn new(
        aggregate: Arc<ReductionAggregate>,
        control: ControlLoop,
        schedules: Vec<ScheduleContributor>,
        media: Vec<BandwidthContributor<MediaServer>>,
    ) -> Self {
        Self {
            aggregate,
            control,
            schedules,
            media,
        }
    }

    /// Build every adapter and contributor from a validated config. Nothing
    /// is contacted yet.
    pub fn from_config(cfg: &SeedgateConfig) -> Result<Self> {
        let aggregate = Arc::new(ReductionAggregate::new());

        let mut clients: Vec<Box<dyn TorrentClient>> = Vec::with_capacity(cfg.clients.len());
        for client in &cfg.clients {
            let adapter = ClientAdapter::from_config(client, cfg.units)
                .with_context(|| format!("torrent client {}", client.url))?;
            clients.push(Box::new(adapter));
        }

        let mut media = Vec::with_capacity(cfg.media_servers.len());
        for (i, server) in cfg.media_servers.iter().enumerate() {
            let provider = MediaServer::from_config(i, server)
                .with_context(|| format!("media server {}", server.url))?;
            media.push(BandwidthContributor::new(
                provider,
                server.bandwidth_multiplier,
                cfg.units,
                Duration::from_secs(server.update_interval),
                Arc::clone(&aggregate),
            ));
        }

        let schedules = cfg
            .schedule_windows()
            .context("schedules")?
            .into_iter()
            .enumerate()
            .map(|(i, window)| ScheduleContributor::new(i, window, Arc::clone(&aggregate)))
            .collect();

        let control = ControlLoop::new(
            Arc::clone(&aggregate),
            SpeedBounds::new(cfg.min_upload, cfg.max_upload),
            SpeedBounds::new(cfg.min_download, cfg.max_download),
            cfg.units,
            clients,
        );

        Ok(Self::new(aggregate, control, schedules, media))
    }

    pub fn aggregate(&self) -> &Arc<ReductionAggregate> {
        &self.aggregate
    }

    /// Run until `cancel` fires. Contributors log their own failures and keep
    /// going; only a panicked task stops the rest. Forces one update at
    /// startup so clients get limits before any contributor reports.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for contributor in self.media {
            tracing::info!(contributor = %contributor.id(), "starting media server contributor");
            let cancel = cancel.clone();
            tasks.spawn(async move {
                contributor.run(cancel).await;
                Ok(())
            });
        }
        for contributor in self.schedules {
            tracing::info!(contributor = %contributor.id(), "starting schedule contributor");
            let cancel = cancel.clone();
            tasks.spawn(async move {
                contributor.run(cancel).await;
                Ok(())
            });
        }
        {
            let cancel = cancel.clone();
            let control = self.control;
            tasks.spawn(async move {
                control.run(cancel).await;
                Ok(())
            });
        }

        self.aggregate.signal().raise();
        tracing::info!("seedgate running");

        let mut first_error: Option<anyhow::Error> = None;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(anyhow::Error::new(e).context("task panicked")),
            };
            if let Err(e) = result {
                tracing::error!("{:#}", e);
                cancel.cancel();
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("seedgate stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
