use crate::{command::Command, subscription::Subscription};

/// A console screen or workflow following the Elm Architecture.
///
/// State changes only in [`update`](Self::update). Side effects are
/// [`Command`]s; cached server data arrives through query
/// [`Subscription`]s.
///
/// # Example
///
/// ```
/// use workervet_query::{application::Application, command::Command, subscription::Subscription};
///
/// #[derive(Debug, Clone)]
/// enum Message {
///     NextPage,
///     PrevPage,
/// }
///
/// struct CandidateList {
///     page: u32,
/// }
///
/// impl Application for CandidateList {
///     type Message = Message;
///     type Flags = u32; // Initial page
///
///     fn new(page: u32) -> (Self, Command<Message>) {
///         (CandidateList { page }, Command::none())
///     }
///
///     fn update(&mut self, msg: Message) -> Command<Message> {
///         match msg {
///             Message::NextPage => self.page += 1,
///             Message::PrevPage => self.page = self.page.saturating_sub(1).max(1),
///         }
///         Command::none()
///     }
///
///     fn subscriptions(&self) -> Vec<Subscription<Message>> {
///         vec![]
///     }
/// }
/// ```
pub trait Application: Sized + Send + 'static {
    /// Every event the application reacts to.
    type Message: Send + 'static;

    /// Data passed at initialization. Use `()` if none is needed.
    type Flags: Send;

    /// Builds the initial state and a command to run at startup.
    fn new(flags: Self::Flags) -> (Self, Command<Self::Message>);

    /// Processes one message.
    fn update(&mut self, msg: Self::Message) -> Command<Self::Message>;

    /// The subscriptions wanted in the current state.
    ///
    /// Called after initialization and after every update. Subscriptions
    /// that disappear from the list are cancelled.
    fn subscriptions(&self) -> Vec<Subscription<Self::Message>>;
}
