use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    application::Application,
    command::{Action, Command},
    subscription::SubscriptionManager,
};

/// Drives an [`Application`]: runs its commands, keeps its subscriptions in
/// sync and feeds every message to `update` in arrival order.
pub struct Runtime<A: Application> {
    app: A,
    init: Option<Command<A::Message>>,
    tx: mpsc::UnboundedSender<Action<A::Message>>,
    rx: mpsc::UnboundedReceiver<Action<A::Message>>,
    subscription_manager: SubscriptionManager<A::Message>,
}

impl<A: Application> Runtime<A> {
    pub fn new(flags: A::Flags) -> Self {
        let (app, init) = A::new(flags);
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription_manager = SubscriptionManager::new(tx.clone());

        Self {
            app,
            init: Some(init),
            tx,
            rx,
            subscription_manager,
        }
    }

    /// The application state.
    pub const fn app(&self) -> &A {
        &self.app
    }

    /// Runs until a command emits [`Action::Quit`], then returns the
    /// application.
    pub async fn run(mut self) -> A {
        if let Some(init) = self.init.take() {
            self.execute(init);
        }
        self.subscription_manager.update(self.app.subscriptions());

        while let Some(action) = self.rx.recv().await {
            match action {
                Action::Message(msg) => {
                    let cmd = self.app.update(msg);
                    self.execute(cmd);
                    self.subscription_manager.update(self.app.subscriptions());
                }
                Action::Quit => {
                    debug!("quit requested");
                    break;
                }
            }
        }

        self.subscription_manager.shutdown().await;
        self.app
    }

    fn execute(&self, cmd: Command<A::Message>) {
        let Some(mut stream) = cmd.stream else {
            return;
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(action) = stream.next().await {
                if tx.send(action).is_err() {
                    break;
                }
            }
        });
    }
}
