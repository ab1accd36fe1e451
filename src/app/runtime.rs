use super::{ShutdownReason, SmartDoorOrchestrator};
use crate::error::{Result, SmartDoorError};
use crate::events::{EventBusError, EventFilter, SmartDoorEvent};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

type SharedSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl SmartDoorOrchestrator {
    /// Run until a signal or a shutdown request arrives, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("Smartdoor system is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| SmartDoorError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| SmartDoorError::system("Shutdown receiver already taken"))?;

        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));
        self.setup_signal_handlers(&shutdown_sender);
        self.setup_shutdown_listener(&shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| SmartDoorError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Smartdoor system shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self, shutdown_sender: &SharedSender) {
        // SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    send_reason(
                        &shutdown_sender_sigterm,
                        ShutdownReason::Signal("SIGTERM".to_string()),
                    )
                    .await;
                }
            });
        }

        // SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_reason(
                    &shutdown_sender_sigint,
                    ShutdownReason::Signal("SIGINT".to_string()),
                )
                .await;
            }
        });
    }

    /// Any component may request shutdown through the event bus
    fn setup_shutdown_listener(&self, shutdown_sender: &SharedSender) {
        let shutdown_sender = Arc::clone(shutdown_sender);
        let mut receiver = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown",
        );

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(SmartDoorEvent::ShutdownRequested { .. }) => {
                        send_reason(&shutdown_sender, ShutdownReason::UserRequest).await;
                        break;
                    }
                    Ok(_) | Err(EventBusError::Lagged { .. }) => continue,
                    Err(_) => break,
                }
            }
        });
    }
}

async fn send_reason(shutdown_sender: &SharedSender, reason: ShutdownReason) {
    if let Some(sender) = shutdown_sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
