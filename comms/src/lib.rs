/// Set of commands which the server can receive and process
pub mod command;
/// Set of events split into Reply and Broadcast events according to their source
pub mod event;
/// Room, member and chat state shared between commands and events
pub mod snapshot;
/// Flashcard decks, quizzes and grading results
pub mod study;
/// Implementation of event and command transportation over TCP Streams.
/// Requires 'server' or 'client' features to be enabled and will bring in tokio dependency alongside with other dependencies
pub mod transport;
