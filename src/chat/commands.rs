// Slash commands available to authenticated sessions

use crate::chat::error::ChatError;
use crate::chat::session::{ChatMode, SessionKey};
use crate::chat::state::ChatState;

/// Lines starting with this are commands
pub const COMMAND_PREFIX: char = '/';

const HELP_TEXT: &str = "\n命令列表:\n  \
/help - 显示此帮助信息\n  \
/users - 查看在线用户列表\n  \
/w 用户名 - 切换到与指定用户的私聊模式\n  \
/g 或 /group - 返回群聊模式\n  \
/quit - 退出聊天\n\n";

const WHISPER_USAGE: &str = "用法: /w 用户名 - 切换到与指定用户的私聊模式\n";

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand<'a> {
    Help,
    Users,
    /// `/w <username>`; the argument may be missing
    Whisper(Option<&'a str>),
    Group,
    Quit,
    Unknown(&'a str),
}

impl<'a> ChatCommand<'a> {
    /// Parse a trimmed line; `None` if it is not a command
    pub fn parse(line: &'a str) -> Option<Self> {
        if !line.starts_with(COMMAND_PREFIX) {
            return None;
        }

        let mut parts = line.split_whitespace();
        let token = parts.next().unwrap_or(line);

        let command = match token.to_lowercase().as_str() {
            "/help" => Self::Help,
            "/users" => Self::Users,
            "/w" => Self::Whisper(parts.next()),
            "/g" | "/group" => Self::Group,
            "/quit" => Self::Quit,
            _ => Self::Unknown(token),
        };
        Some(command)
    }
}

impl ChatState {
    /// Apply a command for the session under `key`
    pub fn dispatch_command(
        &mut self,
        key: &SessionKey,
        command: ChatCommand<'_>,
    ) -> Result<(), ChatError> {
        match command {
            ChatCommand::Help => {
                self.send_to(key, HELP_TEXT);
                Ok(())
            }
            ChatCommand::Users => {
                if !self.config.features.enable_user_list {
                    self.send_to(key, "用户列表功能已禁用\n");
                    return Err(ChatError::FeatureDisabled("user list"));
                }
                self.send_to(key, self.online_users_line());
                Ok(())
            }
            ChatCommand::Whisper(target) => self.switch_to_whisper(key, target),
            ChatCommand::Group => self.switch_to_group(key),
            ChatCommand::Quit => {
                tracing::info!("{} requested quit", key);
                self.session(key)?.close();
                Ok(())
            }
            ChatCommand::Unknown(token) => {
                self.send_to(key, "未知命令，输入 /help 查看帮助\n");
                Err(ChatError::UnknownCommand(token.to_string()))
            }
        }
    }

    fn switch_to_whisper(&mut self, key: &SessionKey, target: Option<&str>) -> Result<(), ChatError> {
        let Some(target) = target else {
            self.send_to(key, WHISPER_USAGE);
            return Err(ChatError::MissingArgument("/w"));
        };

        if !self.config.features.enable_private_messages {
            self.send_to(key, "私聊功能已禁用\n");
            return Err(ChatError::FeatureDisabled("private messages"));
        }

        let target_connection = match self.registry.lookup_by_username(target) {
            Some(session) => session.connection_id,
            None => {
                self.send_to(key, format!("用户 {} 不在线\n", target));
                return Err(ChatError::TargetOffline(target.to_string()));
            }
        };

        let session = self.session_mut(key)?;
        if session.connection_id == target_connection {
            self.send_to(key, "不能与自己私聊\n");
            return Err(ChatError::WhisperToSelf);
        }

        session.mode = ChatMode::Whisper {
            target: target.to_string(),
        };
        self.send_to(
            key,
            format!(
                "已切换到与 {} 的私聊模式\n输入 /g 或 /group 返回群聊模式\n",
                target
            ),
        );
        Ok(())
    }

    fn switch_to_group(&mut self, key: &SessionKey) -> Result<(), ChatError> {
        let session = self.session_mut(key)?;
        if session.mode == ChatMode::Group {
            self.send_to(key, "当前已经是群聊模式\n");
        } else {
            session.mode = ChatMode::Group;
            self.send_to(key, "已返回群聊模式\n");
        }
        Ok(())
    }
}
