use std::collections::HashMap;
use std::time::Instant;

use crate::client::Client;
use crate::connection::{ConnectionId, ConnectionStatus};
use crate::error::DncError;
use crate::files::FileId;
use crate::messages::{FileAnswer, Notice, Reply, Request};
use crate::protocol::DncProtocol;

pub type Outcome = Result<Option<Reply>, DncError>;
pub type Handler = fn(&mut DncProtocol, ConnectionId, &[&str]) -> Outcome;

/// Maps protocol verbs to their handlers.
pub struct CommandDispatcher {
    handlers: HashMap<String, Handler>,
}

impl CommandDispatcher {
    /// A dispatcher that knows no verb at all.
    pub fn empty() -> Self {
        CommandDispatcher {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` under the uppercase `verb`, replacing any previous one.
    pub fn register(&mut self, verb: &str, handler: Handler) {
        self.handlers.insert(verb.to_uppercase(), handler);
    }

    pub fn dispatch(&self, verb: &str) -> Handler {
        self.handlers.get(verb).copied().unwrap_or(malformed)
    }

    pub fn react(
        &self,
        protocol: &mut DncProtocol,
        connection: ConnectionId,
        message: &str,
    ) -> Outcome {
        let Some(request) = Request::parse(message) else {
            return Err(DncError::MalformedRequest);
        };
        let handler = self.dispatch(&request.verb);
        handler(protocol, connection, &request.args)
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        let mut commands = Self::empty();
        commands.register("CONNECT", connect);
        commands.register("QUIT", quit);
        commands.register("MESSAGE", message);
        commands.register("WHISPER", whisper);
        commands.register("ASK_WHISPER", ask_whisper);
        commands.register("REPLY_WHISPER", reply_whisper);
        commands.register("STOP_WHISPER", stop_whisper);
        commands.register("MUTE", mute);
        commands.register("LISTEN", listen);
        commands.register("NAMES", names);
        commands.register("AWAY", away);
        commands.register("RE", re);
        commands.register("NICK", nick);
        commands.register("ASK_FILE", ask_file);
        commands.register("REPLY_FILE", reply_file);
        commands
    }
}

fn malformed(_: &mut DncProtocol, _: ConnectionId, _: &[&str]) -> Outcome {
    Err(DncError::MalformedRequest)
}

/// Nickname of a logged-in caller.
fn logged_in(protocol: &DncProtocol, id: ConnectionId) -> Result<String, DncError> {
    let connection = protocol.connection(id)?;
    if connection.status == ConnectionStatus::NotConnected {
        return Err(DncError::NotConnected);
    }
    connection
        .nickname
        .clone()
        .ok_or_else(|| DncError::Internal(format!("{id} is logged in without a nickname")))
}

/// Nickname of a logged-in caller who is not away.
fn available(protocol: &DncProtocol, id: ConnectionId) -> Result<String, DncError> {
    let nickname = logged_in(protocol, id)?;
    if protocol.connection(id)?.status == ConnectionStatus::Away {
        return Err(DncError::BadStatus);
    }
    Ok(nickname)
}

fn require_args(args: &[&str], count: usize) -> Result<(), DncError> {
    if args.len() < count {
        return Err(DncError::NotEnoughArgs);
    }
    Ok(())
}

fn connect(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let connection = protocol.connection(id)?;
    if connection.status != ConnectionStatus::NotConnected {
        return Err(DncError::AlreadyConnected);
    }
    let nickname = *args.first().ok_or(DncError::NotEnoughArgs)?;
    if protocol.clients.contains(nickname) {
        return Err(DncError::NicknameInUse);
    }
    if !Client::is_valid_nickname(nickname) {
        return Err(DncError::InvalidNickname);
    }

    let address = connection.address;
    protocol
        .clients
        .add(Client::new(nickname.to_string(), id, address))?;
    let connection = protocol.connection_mut(id)?;
    connection.status = ConnectionStatus::Connected;
    connection.nickname = Some(nickname.to_string());

    protocol.write_all(id, &Notice::Connect.by(nickname));
    Ok(Some(Reply::Done))
}

fn quit(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let nickname = logged_in(protocol, id)?;
    let reason = (!args.is_empty()).then(|| args.join(" "));

    protocol.write_all(id, &Notice::Quit { reason }.by(&nickname));
    protocol.close(id);
    Ok(None)
}

fn message(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let nickname = available(protocol, id)?;
    require_args(args, 1)?;

    if args[0].starts_with('!') {
        let answer = protocol.bot.react(&nickname, args);
        return Ok(Some(Reply::Bot(answer)));
    }

    let text = args.join(" ");
    protocol.write_all(id, &Notice::Message { text }.by(&nickname));
    Ok(Some(Reply::Done))
}

fn whisper(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let nickname = available(protocol, id)?;
    require_args(args, 2)?;

    let dest = protocol.clients.by_nickname(args[0])?.connection;
    let allowed = protocol
        .connections
        .get(dest)
        .ok_or(DncError::NicknameNotExist(Vec::new()))?
        .private
        .contains(&id);
    if !allowed {
        return Err(DncError::WhisperNotAllowed);
    }

    let text = args[1..].join(" ");
    protocol.write_to(args[0], &Notice::Whisper { text }.by(&nickname))?;
    Ok(Some(Reply::Done))
}

fn ask_whisper(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let nickname = available(protocol, id)?;
    require_args(args, 1)?;

    protocol.write_to(args[0], &Notice::AskWhisper.by(&nickname))?;
    Ok(Some(Reply::Done))
}

fn reply_whisper(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let nickname = available(protocol, id)?;
    require_args(args, 2)?;

    let answer = args[1].trim().to_string();
    let accepted = answer.eq_ignore_ascii_case("yes");
    protocol.write_to(args[0], &Notice::ReplyWhisper { answer }.by(&nickname))?;

    if accepted {
        let dest = protocol.clients.by_nickname(args[0])?.connection;
        protocol.connection_mut(dest)?.private.insert(id);
        protocol.connection_mut(id)?.private.insert(dest);
    }
    Ok(Some(Reply::Done))
}

fn stop_whisper(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let nickname = available(protocol, id)?;
    require_args(args, 1)?;

    let dest = protocol.clients.by_nickname(args[0])?.connection;
    if let Some(peer) = protocol.connections.get_mut(dest) {
        peer.private.remove(&id);
    }
    protocol.connection_mut(id)?.private.remove(&dest);

    protocol.write_to(args[0], &Notice::StopWhisper.by(&nickname))?;
    Ok(Some(Reply::Done))
}

fn mute(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    update_ignored(protocol, id, args, true)
}

fn listen(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    update_ignored(protocol, id, args, false)
}

fn update_ignored(
    protocol: &mut DncProtocol,
    id: ConnectionId,
    args: &[&str],
    ignore: bool,
) -> Outcome {
    logged_in(protocol, id)?;
    require_args(args, 1)?;

    let mut unknown = Vec::new();
    let mut targets = Vec::new();
    for &nickname in args {
        match protocol.clients.by_nickname(nickname) {
            Ok(client) => targets.push(client.connection),
            Err(_) => unknown.push(nickname.to_string()),
        }
    }

    let connection = protocol.connection_mut(id)?;
    for target in targets {
        if ignore {
            connection.ignored.insert(target);
        } else {
            connection.ignored.remove(&target);
        }
    }

    if unknown.is_empty() {
        Ok(Some(Reply::Done))
    } else {
        Err(DncError::NicknameNotExist(unknown))
    }
}

fn names(protocol: &mut DncProtocol, id: ConnectionId, _: &[&str]) -> Outcome {
    logged_in(protocol, id)?;
    let names = protocol.clients.nicknames().map(str::to_string).collect();
    Ok(Some(Reply::Names(names)))
}

fn away(protocol: &mut DncProtocol, id: ConnectionId, _: &[&str]) -> Outcome {
    set_status(protocol, id, ConnectionStatus::Away)
}

fn re(protocol: &mut DncProtocol, id: ConnectionId, _: &[&str]) -> Outcome {
    set_status(protocol, id, ConnectionStatus::Connected)
}

fn set_status(protocol: &mut DncProtocol, id: ConnectionId, status: ConnectionStatus) -> Outcome {
    logged_in(protocol, id)?;
    protocol.connection_mut(id)?.status = status;
    Ok(Some(Reply::Done))
}

fn nick(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let old = logged_in(protocol, id)?;
    let new = *args.first().ok_or(DncError::NotEnoughArgs)?;
    if protocol.clients.contains(new) {
        return Err(DncError::NicknameInUse);
    }
    if !Client::is_valid_nickname(new) {
        return Err(DncError::InvalidNickname);
    }

    protocol.write_all(id, &Notice::Nick { new: new.to_string() }.by(&old));
    protocol.clients.rename(&old, new)?;
    protocol.connection_mut(id)?.nickname = Some(new.to_string());
    Ok(Some(Reply::Done))
}

fn ask_file(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let nickname = logged_in(protocol, id)?;
    require_args(args, 3)?;
    let size: u64 = args[1].parse().map_err(|_| DncError::MalformedRequest)?;
    let dest = protocol.clients.by_nickname(args[0])?.connection;

    let file_id = protocol.files.register(id, dest, Instant::now());
    let notice = Notice::AskFile {
        id: file_id,
        size,
        filename: args[2..].join(" "),
    };
    protocol.write_to(args[0], &notice.by(&nickname))?;
    Ok(Some(Reply::File(file_id)))
}

fn reply_file(protocol: &mut DncProtocol, id: ConnectionId, args: &[&str]) -> Outcome {
    let nickname = logged_in(protocol, id)?;
    require_args(args, 2)?;
    let file_id: FileId = args[0].parse().map_err(|_| DncError::FileIdNotExist)?;
    if !protocol.files.is_addressed_to(file_id, id) {
        return Err(DncError::FileIdNotExist);
    }

    let answer = match args[1].to_lowercase().as_str() {
        "yes" => {
            let port = args.get(2).ok_or(DncError::NotEnoughArgs)?;
            let port: u16 = port.parse().map_err(|_| DncError::MalformedRequest)?;
            let address = protocol.connection(id)?.address.ip();
            FileAnswer::Yes { port, address }
        }
        "no" => FileAnswer::No,
        _ => return Err(DncError::BadAnswer),
    };

    let pending = protocol
        .files
        .take(file_id, id)
        .ok_or(DncError::FileIdNotExist)?;
    let sender = protocol
        .connections
        .get(pending.sender)
        .and_then(|connection| connection.nickname.clone())
        .ok_or(DncError::NicknameNotExist(Vec::new()))?;

    let notice = Notice::ReplyFile {
        id: file_id,
        answer,
    };
    protocol.write_to(&sender, &notice.by(&nickname))?;
    Ok(Some(Reply::Done))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::ChatBot;
    use crate::protocol::harness::Harness;
    use crate::protocol::Teardown;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn reply(h: &mut Harness, id: ConnectionId, line: &str) -> String {
        h.send(id, line).unwrap_or_default()
    }

    #[test]
    fn unknown_verbs_are_malformed_and_change_nothing() {
        let mut h = Harness::new();
        let anonymous = h.open();
        let alice = h.login("alice");

        assert_eq!(reply(&mut h, alice, "FOO bar"), "298 ERR_MALFORMEDREQUEST");
        assert_eq!(reply(&mut h, anonymous, "FOO"), "298 ERR_MALFORMEDREQUEST");
        assert_eq!(h.protocol.clients.len(), 1);
        assert!(h.received(alice).is_empty());
    }

    #[test]
    fn later_registration_wins() {
        fn hello(_: &mut DncProtocol, _: ConnectionId, _: &[&str]) -> Outcome {
            Ok(Some(Reply::Bot("hello".into())))
        }
        let mut commands = CommandDispatcher::default();
        commands.register("names", hello);

        let protocol = DncProtocol::new(Duration::from_secs(60)).with_commands(commands);
        let mut h = Harness::with_protocol(protocol);
        let anonymous = h.open();
        assert_eq!(reply(&mut h, anonymous, "names"), ":@bot MESSAGE hello");
    }

    #[test]
    fn connect_checks_run_in_order() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let other = h.open();

        assert_eq!(reply(&mut h, alice, "CONNECT zed"), "200 ERR_ALREADYCONNECTED");
        assert_eq!(reply(&mut h, other, "CONNECT"), "203 ERR_NOTENOUGHARGS");
        assert_eq!(reply(&mut h, other, "CONNECT alice"), "205 ERR_NICKNAMEINUSE");
        assert_eq!(reply(&mut h, other, "CONNECT @bot"), "206 ERR_INVALIDNICKNAME");
        assert_eq!(reply(&mut h, other, "CONNECT a,b"), "206 ERR_INVALIDNICKNAME");
        assert_eq!(
            reply(&mut h, other, "CONNECT elevenchars"),
            "206 ERR_INVALIDNICKNAME"
        );
        assert_eq!(h.protocol.clients.nicknames().collect::<Vec<_>>(), vec!["alice"]);
        assert!(h.received(alice).is_empty());
    }

    #[test]
    fn connect_is_announced() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.open();

        assert_eq!(reply(&mut h, bob, "connect bob"), "100 RPL_DONE");
        assert_eq!(h.received(alice), vec![":bob CONNECT".to_string()]);
        assert_eq!(
            h.protocol.connection(bob).unwrap().status,
            ConnectionStatus::Connected
        );
    }

    #[test]
    fn anonymous_connections_are_refused() {
        let mut h = Harness::new();
        let anonymous = h.open();
        for line in [
            "QUIT",
            "MESSAGE hi",
            "WHISPER bob hi",
            "ASK_WHISPER bob",
            "REPLY_WHISPER bob yes",
            "STOP_WHISPER bob",
            "MUTE bob",
            "LISTEN bob",
            "NAMES",
            "AWAY",
            "RE",
            "NICK bob",
            "ASK_FILE bob 1 a",
            "REPLY_FILE 1 no",
        ] {
            assert_eq!(reply(&mut h, anonymous, line), "201 ERR_NOTCONNECTED", "{line}");
        }
    }

    #[test]
    fn quit_broadcasts_and_closes_without_reply() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");

        assert_eq!(h.send(alice, "QUIT see you"), None);
        assert_eq!(h.received(bob), vec![":alice QUIT see you".to_string()]);
        assert_eq!(h.protocol.take_closing(), vec![(alice, Teardown::Closed)]);
    }

    #[test]
    fn messages_are_broadcast() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");
        let carol = h.login("carol");

        assert_eq!(reply(&mut h, alice, "MESSAGE hello  world"), "100 RPL_DONE");
        assert_eq!(h.received(bob), vec![":alice MESSAGE hello world".to_string()]);
        assert_eq!(h.received(carol), vec![":alice MESSAGE hello world".to_string()]);
        assert!(h.received(alice).is_empty());
        assert_eq!(reply(&mut h, alice, "MESSAGE"), "203 ERR_NOTENOUGHARGS");
    }

    #[test]
    fn bang_messages_go_to_the_bot_only() {
        struct Parrot;
        impl ChatBot for Parrot {
            fn react(&mut self, author: &str, args: &[&str]) -> String {
                format!("{author} said {}", args.join(" "))
            }
        }
        let protocol = DncProtocol::new(Duration::from_secs(60)).with_bot(Parrot);
        let mut h = Harness::with_protocol(protocol);
        let alice = h.login("alice");
        let bob = h.login("bob");

        assert_eq!(
            reply(&mut h, alice, "MESSAGE !roll 20"),
            ":@bot MESSAGE alice said !roll 20"
        );
        assert!(h.received(bob).is_empty());
    }

    #[test]
    fn away_clients_cannot_talk_until_back() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        h.login("bob");

        assert_eq!(reply(&mut h, alice, "AWAY"), "100 RPL_DONE");
        assert_eq!(reply(&mut h, alice, "MESSAGE hi"), "202 ERR_BADSTATUS");
        assert_eq!(reply(&mut h, alice, "ASK_WHISPER bob"), "202 ERR_BADSTATUS");
        assert_eq!(reply(&mut h, alice, "NAMES"), "101 RPL_NAMES alice bob");
        assert_eq!(reply(&mut h, alice, "RE"), "100 RPL_DONE");
        assert_eq!(reply(&mut h, alice, "MESSAGE hi"), "100 RPL_DONE");
    }

    #[test]
    fn mute_hides_broadcasts_until_listen() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");
        let carol = h.login("carol");

        assert_eq!(reply(&mut h, alice, "MUTE bob"), "100 RPL_DONE");
        reply(&mut h, bob, "MESSAGE hi");
        assert!(h.received(alice).is_empty());
        assert_eq!(h.received(carol), vec![":bob MESSAGE hi".to_string()]);

        reply(&mut h, alice, "MESSAGE hey");
        assert_eq!(h.received(bob), vec![":alice MESSAGE hey".to_string()]);

        assert_eq!(reply(&mut h, alice, "LISTEN bob"), "100 RPL_DONE");
        reply(&mut h, bob, "MESSAGE again");
        assert_eq!(h.received(alice), vec![":bob MESSAGE again".to_string()]);
    }

    #[test]
    fn mute_reports_every_unknown_name() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");

        assert_eq!(
            reply(&mut h, alice, "MUTE zed bob yan"),
            "204 ERR_NICKNAMENOTEXIST zed yan"
        );
        assert!(h.protocol.connection(alice).unwrap().ignored.contains(&bob));
        assert_eq!(reply(&mut h, alice, "MUTE"), "203 ERR_NOTENOUGHARGS");
        assert_eq!(
            reply(&mut h, alice, "LISTEN zed"),
            "204 ERR_NICKNAMENOTEXIST zed"
        );
    }

    #[test]
    fn whisper_requires_mutual_agreement() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");

        assert_eq!(reply(&mut h, alice, "WHISPER bob psst"), "207 ERR_WHISPERNOTALLOWED");
        assert_eq!(reply(&mut h, alice, "WHISPER zed psst"), "204 ERR_NICKNAMENOTEXIST");
        assert_eq!(reply(&mut h, alice, "WHISPER bob"), "203 ERR_NOTENOUGHARGS");

        assert_eq!(reply(&mut h, alice, "ASK_WHISPER bob"), "100 RPL_DONE");
        assert_eq!(h.received(bob), vec![":alice ASK_WHISPER".to_string()]);
        assert_eq!(reply(&mut h, bob, "REPLY_WHISPER alice YES"), "100 RPL_DONE");
        assert_eq!(h.received(alice), vec![":bob REPLY_WHISPER YES".to_string()]);

        assert_eq!(reply(&mut h, alice, "WHISPER bob psst  there"), "100 RPL_DONE");
        assert_eq!(h.received(bob), vec![":alice WHISPER psst there".to_string()]);
        assert_eq!(reply(&mut h, bob, "WHISPER alice ok"), "100 RPL_DONE");
        assert_eq!(h.received(alice), vec![":bob WHISPER ok".to_string()]);
    }

    #[test]
    fn declined_whisper_stays_forbidden() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");

        reply(&mut h, alice, "ASK_WHISPER bob");
        assert_eq!(reply(&mut h, bob, "REPLY_WHISPER alice no"), "100 RPL_DONE");
        assert_eq!(h.received(alice), vec![":bob REPLY_WHISPER no".to_string()]);
        assert_eq!(reply(&mut h, alice, "WHISPER bob psst"), "207 ERR_WHISPERNOTALLOWED");
        assert_eq!(
            reply(&mut h, bob, "REPLY_WHISPER zed yes"),
            "204 ERR_NICKNAMENOTEXIST"
        );
    }

    #[test]
    fn stop_whisper_revokes_both_directions() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");
        reply(&mut h, alice, "ASK_WHISPER bob");
        reply(&mut h, bob, "REPLY_WHISPER alice yes");
        h.drain_all();

        assert_eq!(reply(&mut h, bob, "STOP_WHISPER alice"), "100 RPL_DONE");
        assert_eq!(h.received(alice), vec![":bob STOP_WHISPER".to_string()]);
        assert_eq!(reply(&mut h, alice, "WHISPER bob hi"), "207 ERR_WHISPERNOTALLOWED");
        assert_eq!(reply(&mut h, bob, "WHISPER alice hi"), "207 ERR_WHISPERNOTALLOWED");
        assert_eq!(reply(&mut h, bob, "STOP_WHISPER"), "203 ERR_NOTENOUGHARGS");
        assert_eq!(reply(&mut h, bob, "STOP_WHISPER zed"), "204 ERR_NICKNAMENOTEXIST");
    }

    #[test]
    fn nick_renames_and_keeps_relations() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");
        let carol = h.login("carol");
        reply(&mut h, alice, "ASK_WHISPER bob");
        reply(&mut h, bob, "REPLY_WHISPER alice yes");
        reply(&mut h, carol, "MUTE alice");
        h.drain_all();

        assert_eq!(reply(&mut h, alice, "NICK dave"), "100 RPL_DONE");
        assert_eq!(h.received(bob), vec![":alice NICK dave".to_string()]);
        assert!(h.received(carol).is_empty());
        assert!(!h.protocol.clients.contains("alice"));
        assert_eq!(h.protocol.clients.by_nickname("dave").unwrap().connection, alice);

        assert_eq!(reply(&mut h, alice, "WHISPER bob still here"), "100 RPL_DONE");
        assert_eq!(h.received(bob), vec![":dave WHISPER still here".to_string()]);
        reply(&mut h, alice, "MESSAGE hi");
        assert!(h.received(carol).is_empty());
        assert_eq!(reply(&mut h, bob, "NAMES"), "101 RPL_NAMES bob carol dave");
    }

    #[test]
    fn nick_checks_run_in_order() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        h.login("bob");

        assert_eq!(reply(&mut h, alice, "NICK"), "203 ERR_NOTENOUGHARGS");
        assert_eq!(reply(&mut h, alice, "NICK bob"), "205 ERR_NICKNAMEINUSE");
        assert_eq!(reply(&mut h, alice, "NICK @alice"), "206 ERR_INVALIDNICKNAME");
        assert!(h.protocol.clients.contains("alice"));
    }

    #[test]
    fn file_handshake_accepted() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");

        assert_eq!(reply(&mut h, alice, "ASK_FILE bob 1024 report.pdf"), "102 RPL_FILE 1");
        assert_eq!(
            h.received(bob),
            vec![":alice ASK_FILE 1 1024 report.pdf".to_string()]
        );

        assert_eq!(reply(&mut h, bob, "REPLY_FILE 1 yes 9000"), "100 RPL_DONE");
        let bob_ip = h.protocol.connection(bob).unwrap().address.ip();
        assert_eq!(
            h.received(alice),
            vec![format!(":bob REPLY_FILE 1 yes 9000 {bob_ip}")]
        );
        assert!(!h.protocol.files.contains(1));
        assert_eq!(reply(&mut h, bob, "REPLY_FILE 1 no"), "209 ERR_FILEIDNOTEXIST");
    }

    #[test]
    fn file_handshake_declined() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");
        reply(&mut h, alice, "ASK_FILE bob 3 a b.txt");
        assert_eq!(h.received(bob), vec![":alice ASK_FILE 1 3 a b.txt".to_string()]);

        assert_eq!(reply(&mut h, bob, "REPLY_FILE 1 No"), "100 RPL_DONE");
        assert_eq!(h.received(alice), vec![":bob REPLY_FILE 1 NO".to_string()]);
        assert!(h.protocol.files.is_empty());
    }

    #[test]
    fn ask_file_validation() {
        let mut h = Harness::new();
        let alice = h.login("alice");

        assert_eq!(reply(&mut h, alice, "ASK_FILE bob 10"), "203 ERR_NOTENOUGHARGS");
        assert_eq!(reply(&mut h, alice, "ASK_FILE bob big a.txt"), "298 ERR_MALFORMEDREQUEST");
        assert_eq!(reply(&mut h, alice, "ASK_FILE bob 10 a.txt"), "204 ERR_NICKNAMENOTEXIST");
        assert!(h.protocol.files.is_empty());
    }

    #[test]
    fn reply_file_validation() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");
        let carol = h.login("carol");
        reply(&mut h, alice, "ASK_FILE bob 10 a.txt");

        assert_eq!(reply(&mut h, bob, "REPLY_FILE 1"), "203 ERR_NOTENOUGHARGS");
        assert_eq!(reply(&mut h, bob, "REPLY_FILE 7 yes 9000"), "209 ERR_FILEIDNOTEXIST");
        assert_eq!(reply(&mut h, bob, "REPLY_FILE x yes 9000"), "209 ERR_FILEIDNOTEXIST");
        assert_eq!(reply(&mut h, carol, "REPLY_FILE 1 yes 9000"), "209 ERR_FILEIDNOTEXIST");
        assert_eq!(reply(&mut h, bob, "REPLY_FILE 1 maybe"), "208 ERR_BADANSWER");
        assert_eq!(reply(&mut h, bob, "REPLY_FILE 1 yes"), "203 ERR_NOTENOUGHARGS");
        assert_eq!(reply(&mut h, bob, "REPLY_FILE 1 yes 70000"), "298 ERR_MALFORMEDREQUEST");
        assert!(h.protocol.files.contains(1));
        assert!(h.received(alice).is_empty());
    }

    #[test]
    fn reply_file_consumes_entry_when_sender_renamed() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        let bob = h.login("bob");
        reply(&mut h, alice, "ASK_FILE bob 10 a.txt");
        reply(&mut h, alice, "NICK ann");
        h.drain_all();

        assert_eq!(reply(&mut h, bob, "REPLY_FILE 1 no"), "100 RPL_DONE");
        assert_eq!(h.received(alice), vec![":bob REPLY_FILE 1 NO".to_string()]);
    }

    #[test]
    fn file_ids_keep_increasing() {
        let mut h = Harness::new();
        let alice = h.login("alice");
        h.login("bob");
        assert_eq!(reply(&mut h, alice, "ASK_FILE bob 1 a"), "102 RPL_FILE 1");
        assert_eq!(reply(&mut h, alice, "ASK_FILE bob 1 b"), "102 RPL_FILE 2");
        assert_eq!(h.protocol.files.len(), 2);
    }
}
