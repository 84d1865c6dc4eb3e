use futures::{
    FutureExt, Stream, StreamExt,
    stream::{self, BoxStream, select_all},
};

/// What a command asks the runtime to do.
pub enum Action<Msg> {
    /// Deliver a message to [`Application::update`](crate::application::Application::update).
    Message(Msg),

    /// Stop the runtime. [`Runtime::run`](crate::runtime::Runtime::run)
    /// returns the application.
    Quit,
}

impl<Msg> Action<Msg> {
    fn map<T>(self, f: impl FnOnce(Msg) -> T) -> Action<T> {
        match self {
            Self::Message(msg) => Action::Message(f(msg)),
            Self::Quit => Action::Quit,
        }
    }
}

/// A one-off side effect, such as a mutation or a cache invalidation.
///
/// Commands are returned from `Application::new` and `Application::update`
/// and are run by the runtime. Queries are not commands; they are
/// [`Subscription`](crate::subscription::Subscription)s.
///
/// # Examples
///
/// ```
/// use workervet_query::command::Command;
///
/// enum Message {
///     SkillDeleted(Result<(), String>),
/// }
///
/// let cmd = Command::perform(
///     async { Ok(()) },
///     Message::SkillDeleted,
/// );
/// ```
pub struct Command<Msg: Send + 'static> {
    pub(crate) stream: Option<BoxStream<'static, Action<Msg>>>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// A command that does nothing.
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Run `future` and turn its output into a message.
    ///
    /// ```
    /// use workervet_query::command::Command;
    ///
    /// async fn delete_department(id: String) -> Result<(), String> {
    ///     Ok(())
    /// }
    ///
    /// enum Message {
    ///     Deleted(Result<(), String>),
    /// }
    ///
    /// let cmd = Command::perform(delete_department("d1".into()), Message::Deleted);
    /// ```
    pub fn perform<A>(
        future: impl Future<Output = A> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::future(future.map(f))
    }

    /// Run a future that already produces a message.
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(future.into_stream().map(Action::Message).boxed()),
        }
    }

    /// Emit a single action.
    ///
    /// ```
    /// use workervet_query::command::{Action, Command};
    ///
    /// let cmd: Command<i32> = Command::effect(Action::Quit);
    /// ```
    pub fn effect(action: Action<Msg>) -> Self {
        Self {
            stream: Some(stream::once(async move { action }).boxed()),
        }
    }

    /// Shorthand for `Command::effect(Action::Message(msg))`.
    pub fn message(msg: Msg) -> Self {
        Self::effect(Action::Message(msg))
    }

    /// Run several commands concurrently.
    ///
    /// Message order across commands is not guaranteed. `Command::none()`
    /// entries are dropped.
    pub fn batch(commands: impl IntoIterator<Item = Command<Msg>>) -> Self {
        let streams: Vec<_> = commands.into_iter().filter_map(|cmd| cmd.stream).collect();

        if streams.is_empty() {
            Self::none()
        } else {
            Self {
                stream: Some(select_all(streams).boxed()),
            }
        }
    }

    /// Deliver every item of `stream` as a message.
    pub fn stream(stream: impl Stream<Item = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(stream.map(Action::Message).boxed()),
        }
    }

    /// Convert the messages this command produces.
    ///
    /// ```
    /// use workervet_query::command::Command;
    ///
    /// enum Message {
    ///     Saved(Result<u32, String>),
    /// }
    ///
    /// let cmd: Command<Result<u32, String>> = Command::future(async { Ok(1) });
    /// let cmd = cmd.map(Message::Saved);
    /// ```
    pub fn map<T: Send + 'static>(self, f: impl Fn(Msg) -> T + Send + 'static) -> Command<T> {
        Command {
            stream: self
                .stream
                .map(|stream| stream.map(move |action| action.map(&f)).boxed()),
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.stream.is_none()
    }
}
