use audio_scope::acquisition::{list_ports, LinkStatus};
use audio_scope::gui_bridge::{GuiBridge, GuiCommand};
use audio_scope::handoff::HandoffReceiver;
use audio_scope::visualizer::Visualizer;
use audio_scope::{Config, Pipeline, Variant};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

fn connect(
    config: &Config,
    status_tx: &mpsc::Sender<LinkStatus>,
) -> anyhow::Result<(Pipeline, Visualizer)> {
    let (pipeline, queue): (Pipeline, HandoffReceiver) =
        Pipeline::start(config.clone(), status_tx.clone())?;
    Ok((pipeline, Visualizer::new(queue, config.sample_rate)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let mut config = Config::new().map_err(anyhow::Error::msg)?;
    config.validate()?;

    // 状态通道，采集线程发布连接状态
    let (status_tx, mut status_rx) = mpsc::channel::<LinkStatus>(32);

    // GUI进程通道
    let (tx_gui_cmd, mut rx_gui_cmd) = mpsc::channel::<GuiCommand>(16);

    if config.variant == Variant::Hardware {
        log::info!("Status: {}", LinkStatus::Ports(list_ports()));
    }

    // 启动GUI桥，与GUI进程通信
    let gui_bridge = Arc::new(GuiBridge::new(&config, tx_gui_cmd).await?);
    let gui_bridge_clone = gui_bridge.clone();
    tokio::spawn(async move {
        if let Err(e) = gui_bridge_clone.run().await {
            log::error!("GuiBridge error: {}", e);
        }
    });

    let mut active = Some(connect(&config, &status_tx)?);
    // 正在关闭的采集线程，重新连接前必须已释放设备
    let mut retiring: Option<tokio::task::JoinHandle<()>> = None;

    let mut ticker = time::interval(Duration::from_millis(config.tick_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!("{} {} started ({:?})", env!("APP_NAME"), env!("APP_VERSION"), config.variant);

    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                log::info!("Received Ctrl+C, shutting down...");
                break;
            }

            Some(status) = status_rx.recv() => {
                match status {
                    LinkStatus::Failed(reason) => {
                        // 不自动重连，等待用户重新连接
                        log::error!("Acquisition stopped: {}. Send a connect command to retry.", reason);
                    }
                    other => log::info!("Status: {}", other),
                }
            }

            Some(cmd) = rx_gui_cmd.recv() => {
                log::info!("Received command from GUI: {:?}", cmd);
                match cmd {
                    GuiCommand::Connect => {
                        if active.as_ref().is_some_and(|(p, _)| p.is_running()) {
                            continue;
                        }
                        let idle = active.as_ref().is_none_or(|(p, _)| p.is_finished());
                        let released = retiring.as_ref().is_none_or(|h| h.is_finished());
                        if !idle || !released {
                            log::warn!("Previous producer has not released its devices yet");
                            continue;
                        }
                        retiring = None;
                        // The old producer has returned, so this join is immediate.
                        active = None;
                        match connect(&config, &status_tx) {
                            Ok(pair) => active = Some(pair),
                            Err(e) => log::error!("Failed to start pipeline: {}", e),
                        }
                    }
                    GuiCommand::Disconnect => {
                        if let Some((pipeline, _)) = active.take() {
                            retiring = Some(pipeline.shutdown());
                        }
                    }
                    GuiCommand::Filter { enabled } => {
                        config.filter_enabled = enabled;
                        if let Some((pipeline, _)) = &active {
                            pipeline.set_filter_enabled(enabled);
                        }
                    }
                    GuiCommand::Visualization { enabled } => {
                        config.visualization = enabled;
                        if let Some((pipeline, _)) = &active {
                            pipeline.set_visualization_enabled(enabled);
                        }
                    }
                }
            }

            _ = ticker.tick() => {
                if !config.visualization {
                    continue;
                }
                if let Some((_, visualizer)) = active.as_mut() {
                    visualizer.tick(gui_bridge.as_ref()).await;
                }
            }
        }
    }

    // Joining the producer closes the devices. The runtime waits on blocking
    // tasks when dropped, so a producer parked on a silent board forces exit.
    let mut pending: Vec<_> = retiring.into_iter().collect();
    if let Some((pipeline, _)) = active.take() {
        pending.push(pipeline.shutdown());
    }
    for join in pending {
        if time::timeout(Duration::from_secs(2), join).await.is_err() {
            log::warn!("Producer did not stop in time, exiting anyway");
            std::process::exit(0);
        }
    }
    Ok(())
}
