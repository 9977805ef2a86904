use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use irc::client::prelude::*;
use irc::proto::CapSubCommand;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

use crate::bot::achievements::Notice;
use crate::bot::{Bot, IncomingMessage};
use crate::util::env::{self, EnvErr, Var};
use crate::var;

const REJOIN_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum IrcCommand {
    ReplyPm { channel: String, message: String },
}

#[derive(Debug)]
pub enum IrcMessage {
    Privmsg { tags: IrcTags, message: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IrcTags {
    pub user_id: String,
    pub display_name: String,
    pub message_id: String,
    pub channel: String,
}

impl IrcTags {
    pub fn into_incoming(self, text: &str) -> IncomingMessage {
        let message_id = if self.message_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.message_id
        };

        IncomingMessage {
            user_id: self.user_id,
            display_name: self.display_name,
            chat_id: self.channel,
            message_id,
            text: text.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct IrcConnection {
    pub client: Client,
    pub channels: Vec<String>,
    pub sender: UnboundedSender<IrcMessage>,
    pub receiver: UnboundedReceiver<IrcCommand>,
    pub id: Uuid,
}

/// Connects to chat and spawns the connection loop plus the message reader.
///
/// Replies and notices are written back to the channel they belong to.
#[instrument(skip(bot, notices))]
pub async fn irc_runner(
    bot: Arc<Bot>,
    channels: Vec<String>,
    mut notices: UnboundedReceiver<Notice>,
) -> IrcResult<Vec<JoinHandle<()>>> {
    let (mut conn, mut msg_rx, cmd_tx) = IrcConnection::init(channels).await?;
    conn.connect()?;
    let mut stream = conn.client.stream()?;

    let reader_handle = tokio::spawn(async move {
        if let Err(e) = read_channel(&bot, &mut msg_rx, &cmd_tx).await {
            tracing::error!(error = ?e, "IRC reader stopped");
        }
    });

    let client_handle = tokio::spawn(async move {
        let mut check_interval = tokio::time::interval(REJOIN_INTERVAL);
        check_interval.tick().await;

        loop {
            tokio::select! {
                Some(msg_res) = stream.next() => {
                    match msg_res {
                        Ok(msg) => {
                            if let Err(e) = command_parser(&msg, &mut conn) {
                                tracing::error!(error = ?e, "IRC message handling failure");
                            }
                        }
                        Err(e) => tracing::warn!(error = ?e, "IRC stream error"),
                    }
                }

                Some(cmd) = conn.receiver.recv() => {
                    let IrcCommand::ReplyPm { channel, message } = cmd;
                    if let Err(e) = conn.client.send_privmsg(&channel, message) {
                        tracing::error!(error = ?e, %channel, "failed to send reply");
                    }
                }

                Some(notice) = notices.recv() => {
                    if let Err(e) = conn.client.send_privmsg(&notice.chat_id, notice.text) {
                        tracing::error!(error = ?e, channel = %notice.chat_id, "failed to send notice");
                    }
                }

                _ = check_interval.tick() => {
                    if let Err(e) = rejoin_channels(&mut conn) {
                        tracing::error!(error = ?e, "channel rejoin failure");
                    }
                }
            }
        }
    });

    Ok(vec![client_handle, reader_handle])
}

#[instrument(skip(client))]
fn rejoin_channels(client: &mut IrcConnection) -> IrcResult<()> {
    let expected: HashSet<String> = client.channels.iter().cloned().collect();
    let joined: HashSet<String> = client.get_joined().into_iter().collect();

    let missing: Vec<String> = expected.difference(&joined).cloned().collect();

    if !missing.is_empty() {
        tracing::warn!(missing_count = missing.len(), missing = ?missing, "trying channel rejoin");
        client.join_channels(&missing)?;
    } else {
        tracing::debug!(joined_count = joined.len(), "all channels appear joined");
    }

    Ok(())
}

pub fn channel_room(name: &str) -> String {
    let name = name.trim().to_lowercase();
    match name.starts_with('#') {
        true => name,
        false => format!("#{name}"),
    }
}

impl IrcConnection {
    #[instrument(skip(channels))]
    pub async fn init(
        channels: Vec<String>,
    ) -> IrcResult<(Self, UnboundedReceiver<IrcMessage>, UnboundedSender<IrcCommand>)> {
        let channel_rooms: Vec<String> = channels.iter().map(|chan| channel_room(chan)).collect();
        tracing::info!(channels = ?channel_rooms, "channel list");

        let env = env::env().await?;
        let config = Config {
            use_tls: Some(true),
            nickname: Some(var!(Var::IrcNickname).await?.to_string()),
            password: Some(format!("oauth:{}", var!(Var::IrcToken).await?)),
            server: Some(env.irc_server.clone()),
            port: Some(env.irc_port),
            ping_time: Some(300),
            ..Config::default()
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<IrcCommand>();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel::<IrcMessage>();

        let client = Client::from_config(config).await?;

        Ok((
            Self {
                client,
                channels: channel_rooms,
                sender: msg_tx,
                receiver: cmd_rx,
                id: Uuid::new_v4(),
            },
            msg_rx,
            cmd_tx,
        ))
    }

    #[instrument(skip(self))]
    pub fn connect(&mut self) -> IrcResult<()> {
        self.client.identify()?;
        self.client.send_cap_req(&[
            TtvCap::Commands.into(),
            TtvCap::Membership.into(),
            TtvCap::Tags.into(),
        ])?;

        Ok(())
    }

    pub fn join_all_channels(&mut self) -> IrcResult<()> {
        let channels = self.channels.clone();
        self.join_channels(&channels)
    }

    #[instrument(skip(self))]
    pub fn join_channels(&mut self, channels: &[String]) -> IrcResult<()> {
        tracing::info!("sending join");
        self.client.send_join(channels.join(","))?;

        Ok(())
    }

    #[instrument(skip(self), fields(id = %self.id))]
    pub fn get_joined(&self) -> Vec<String> {
        self.client.list_channels().unwrap_or_default()
    }
}

#[instrument(skip(msg, client))]
fn command_parser(msg: &Message, client: &mut IrcConnection) -> IrcResult<()> {
    match &msg.command {
        Command::PRIVMSG(channel, content) => {
            let data = IrcMessage::Privmsg {
                tags: parse_tags(msg, channel),
                message: content.to_string(),
            };

            tracing::debug!(data = ?data, "RX PRIVMSG");
            if let Err(e) = client.sender.send(data) {
                tracing::error!(error = ?e, "failed to send to reader channel");
            }
        }

        Command::CAP(_, result, caps, _) => match result {
            CapSubCommand::ACK => {
                if let Some(caps) = caps {
                    tracing::info!("CAP REQ {} ok", caps);
                }

                if client.get_joined().is_empty() {
                    client.join_all_channels()?;
                }
            }

            CapSubCommand::NAK => tracing::warn!("CAP REQ {:?} invalid", caps),

            _ => tracing::debug!(result = ?result, "unhandled CAP response"),
        },

        Command::NOTICE(to, text) => {
            tracing::warn!(%to, %text, "RX NOTICE");
        }

        Command::JOIN(channel, _, _) => {
            if let Some(Prefix::Nickname(user, _, _)) = &msg.prefix {
                tracing::debug!(%user, %channel, "JOIN");
            }
        }

        _ => {
            tracing::trace!(command = ?msg.command, "IRC received generic cmd");
        }
    }

    Ok(())
}

/// Feeds chat lines through the bot in arrival order and queues any reply.
#[instrument(skip_all)]
async fn read_channel(
    bot: &Bot,
    rx: &mut UnboundedReceiver<IrcMessage>,
    tx: &UnboundedSender<IrcCommand>,
) -> IrcResult<()> {
    tracing::debug!("IRC mpsc reader started");

    while let Some(msg) = rx.recv().await {
        let IrcMessage::Privmsg { tags, message } = msg;
        let channel = tags.channel.clone();
        let incoming = tags.into_incoming(&message);

        if let Some(reply) = bot.respond(&incoming).await {
            tx.send(IrcCommand::ReplyPm {
                channel,
                message: reply,
            })?;
        }
    }

    Ok(())
}

/// Twitch tags carry the stable user id and message id; plain IRC falls back to the nick.
pub fn parse_tags(msg: &Message, channel: &str) -> IrcTags {
    let mut result = IrcTags {
        channel: channel_room(channel),
        ..IrcTags::default()
    };

    for tag in msg.tags.iter().flatten() {
        match (tag.0.as_str(), &tag.1) {
            ("user-id", Some(user_id)) => result.user_id = user_id.clone(),
            ("display-name", Some(name)) => result.display_name = name.clone(),
            ("id", Some(id)) => result.message_id = id.clone(),
            _ => (),
        }
    }

    if let Some(nick) = msg.source_nickname() {
        if result.user_id.is_empty() {
            result.user_id = nick.to_lowercase();
        }
        if result.display_name.is_empty() {
            result.display_name = nick.to_string();
        }
    }

    result
}

pub type IrcResult<T> = core::result::Result<T, IrcClientErr>;

#[derive(Debug, Error)]
pub enum IrcClientErr {
    #[error(transparent)]
    EnvError(#[from] EnvErr),

    #[error(transparent)]
    ClientError(#[from] irc::error::Error),

    #[error(transparent)]
    MpscSendCommandErr(#[from] mpsc::error::SendError<IrcCommand>),
}

#[derive(Debug)]
pub enum TtvCap {
    Tags,
    Commands,
    Membership,
}

impl From<TtvCap> for Capability {
    fn from(value: TtvCap) -> Self {
        match value {
            TtvCap::Tags => Capability::Custom("twitch.tv/tags"),
            TtvCap::Commands => Capability::Custom("twitch.tv/commands"),
            TtvCap::Membership => Capability::Custom("twitch.tv/membership"),
        }
    }
}
