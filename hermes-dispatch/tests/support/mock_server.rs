//! Mock SMTP submission server.
//!
//! Speaks just enough SMTP to exercise [`hermes_dispatch::SmtpTransport`]:
//! - configurable greeting and EHLO capabilities
//! - AUTH PLAIN / LOGIN against one set of credentials
//! - per-recipient rejection
//! - capture of every command and message body
#![allow(dead_code)]

use std::{
    collections::HashSet,
    fmt::Write,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// A command received by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Auth(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    MessageContent(String),
    Quit,
    StartTls,
    Other(String),
}

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Clone)]
struct MockServerConfig {
    greeting: (u16, String),
    capabilities: Vec<String>,
    credentials: Option<Credentials>,
    rejected_recipients: HashSet<String>,
    data_end_code: u16,
    response_delay: Option<Duration>,
    hang_up_on_quit: bool,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: (220, "Mock SMTP Server".to_string()),
            capabilities: vec![
                "localhost".to_string(),
                "AUTH PLAIN LOGIN".to_string(),
                "SIZE 10000".to_string(),
            ],
            credentials: None,
            rejected_recipients: HashSet::new(),
            data_end_code: 250,
            response_delay: None,
            hang_up_on_quit: false,
        }
    }
}

fn reply(code: u16, message: &str) -> String {
    format!("{code} {message}\r\n")
}

fn decode(value: &str) -> String {
    STANDARD
        .decode(value.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

fn address(argument: &str) -> String {
    argument
        .split_once(':')
        .map_or(argument, |(_, address)| address)
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}

/// Mock SMTP server bound to an ephemeral port on 127.0.0.1.
pub struct MockSmtpServer {
    addr: SocketAddr,
    commands_received: Arc<RwLock<Vec<SmtpCommand>>>,
    shutdown: Arc<AtomicBool>,
    connections: Arc<AtomicUsize>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: MockServerConfig::default(),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands_received.read().await.clone()
    }

    /// Message bodies received, in order.
    pub async fn messages(&self) -> Vec<String> {
        self.commands()
            .await
            .into_iter()
            .filter_map(|command| match command {
                SmtpCommand::MessageContent(content) => Some(content),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    #[allow(clippy::too_many_lines)]
    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut authenticated = config.credentials.is_none();

        writer
            .write_all(reply(config.greeting.0, &config.greeting.1).as_bytes())
            .await?;

        loop {
            line.clear();
            let Ok(read) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            let command_line = line.trim_end().to_string();
            tracing::debug!("Mock server received: {command_line}");
            let (verb, argument) = command_line
                .split_once(' ')
                .unwrap_or((command_line.as_str(), ""));

            let (response, command) = match verb.to_uppercase().as_str() {
                "EHLO" => {
                    let mut response = String::new();
                    let last = config.capabilities.len().saturating_sub(1);
                    for (i, capability) in config.capabilities.iter().enumerate() {
                        let separator = if i == last { ' ' } else { '-' };
                        let _ = write!(response, "250{separator}{capability}\r\n");
                    }
                    (response, SmtpCommand::Ehlo(argument.to_string()))
                }
                "AUTH" => {
                    let (mechanism, initial) =
                        argument.split_once(' ').unwrap_or((argument, ""));
                    let mechanism = mechanism.to_uppercase();
                    commands
                        .write()
                        .await
                        .push(SmtpCommand::Auth(mechanism.clone()));

                    let (username, password) = match mechanism.as_str() {
                        "PLAIN" => {
                            let decoded = decode(initial);
                            let mut parts = decoded.split('\0').skip(1);
                            (
                                parts.next().unwrap_or_default().to_string(),
                                parts.next().unwrap_or_default().to_string(),
                            )
                        }
                        "LOGIN" => {
                            writer.write_all(reply(334, "VXNlcm5hbWU6").as_bytes()).await?;
                            line.clear();
                            reader.read_line(&mut line).await?;
                            let username = decode(&line);

                            writer.write_all(reply(334, "UGFzc3dvcmQ6").as_bytes()).await?;
                            line.clear();
                            reader.read_line(&mut line).await?;
                            (username, decode(&line))
                        }
                        _ => {
                            writer
                                .write_all(reply(504, "Unrecognized authentication type").as_bytes())
                                .await?;
                            continue;
                        }
                    };

                    let accepted = config.credentials.as_ref().is_none_or(|expected| {
                        expected.username == username && expected.password == password
                    });
                    authenticated = accepted;
                    let response = if accepted {
                        reply(235, "Authentication successful")
                    } else {
                        reply(535, "Authentication credentials invalid")
                    };
                    writer.write_all(response.as_bytes()).await?;
                    continue;
                }
                "MAIL" if !authenticated => (
                    reply(530, "Authentication required"),
                    SmtpCommand::MailFrom(address(argument)),
                ),
                "MAIL" => (reply(250, "OK"), SmtpCommand::MailFrom(address(argument))),
                "RCPT" => {
                    let recipient = address(argument);
                    let response = if config.rejected_recipients.contains(&recipient) {
                        reply(550, "User unknown")
                    } else {
                        reply(250, "OK")
                    };
                    (response, SmtpCommand::RcptTo(recipient))
                }
                "DATA" => {
                    commands.write().await.push(SmtpCommand::Data);
                    writer
                        .write_all(reply(354, "End data with <CR><LF>.<CR><LF>").as_bytes())
                        .await?;

                    let mut content = String::new();
                    loop {
                        line.clear();
                        if reader.read_line(&mut line).await? == 0 {
                            return Ok(());
                        }
                        if line.trim_end_matches(['\r', '\n']) == "." {
                            break;
                        }
                        content.push_str(&line);
                    }
                    commands
                        .write()
                        .await
                        .push(SmtpCommand::MessageContent(content));

                    if let Some(delay) = config.response_delay {
                        tokio::time::sleep(delay).await;
                    }
                    let response = if config.data_end_code == 250 {
                        reply(250, "OK: Message accepted")
                    } else {
                        reply(config.data_end_code, "Message rejected")
                    };
                    writer.write_all(response.as_bytes()).await?;
                    continue;
                }
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    if !config.hang_up_on_quit {
                        writer.write_all(reply(221, "Bye").as_bytes()).await?;
                    }
                    return Ok(());
                }
                "STARTTLS" => (
                    reply(502, "Command not implemented"),
                    SmtpCommand::StartTls,
                ),
                _ => (
                    reply(500, "Unknown command"),
                    SmtpCommand::Other(command_line.clone()),
                ),
            };

            commands.write().await.push(command);

            if let Some(delay) = config.response_delay {
                tokio::time::sleep(delay).await;
            }
            writer.write_all(response.as_bytes()).await?;
        }
    }
}

/// Builder for [`MockSmtpServer`].
pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = (code, message.into());
        self
    }

    /// Replaces the EHLO capability lines (the first line is the server name).
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.config.capabilities = capabilities.iter().map(ToString::to_string).collect();
        self
    }

    /// Only these credentials are accepted; MAIL is refused until they are.
    #[must_use]
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.config.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    #[must_use]
    pub fn rejecting(mut self, recipient: &str) -> Self {
        self.config.rejected_recipients.insert(recipient.to_string());
        self
    }

    #[must_use]
    pub const fn with_data_end_code(mut self, code: u16) -> Self {
        self.config.data_end_code = code;
        self
    }

    #[must_use]
    pub const fn with_response_delay(mut self, delay: Duration) -> Self {
        self.config.response_delay = Some(delay);
        self
    }

    /// Closes the connection on QUIT without replying.
    #[must_use]
    pub const fn hanging_up_on_quit(mut self) -> Self {
        self.config.hang_up_on_quit = true;
        self
    }

    /// Binds to an ephemeral port and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(AtomicUsize::new(0));

        let commands_clone = Arc::clone(&commands);
        let shutdown_clone = Arc::clone(&shutdown);
        let connections_clone = Arc::clone(&connections);

        tokio::spawn(async move {
            while !shutdown_clone.load(Ordering::Relaxed) {
                let accepted = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accepted {
                    connections_clone.fetch_add(1, Ordering::Relaxed);
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands_clone);

                    tokio::spawn(async move {
                        if let Err(e) = MockSmtpServer::handle_client(stream, config, commands).await
                        {
                            tracing::debug!("Mock server client error: {e}");
                        }
                    });
                }
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands_received: commands,
            shutdown,
            connections,
        })
    }
}
