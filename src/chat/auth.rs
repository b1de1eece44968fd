// Username/password handshake
//
// AwaitingUsername -> AwaitingPassword { registering } -> Authenticated
//
// Login and registration share the username prompt; which one happens depends
// only on whether the name is already in the user table. A failed login goes
// all the way back to the username prompt.

use crate::chat::error::ChatError;
use crate::chat::password::{hash_password, verify_password};
use crate::chat::session::{AuthState, SessionKey};
use crate::chat::state::ChatState;
use crate::chat::storage::UserRecord;

/// Minimum password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 3;

const USERNAME_PROMPT: &str = "请输入您的用户名: ";
const PASSWORD_PROMPT: &str = "请输入密码: ";
const REGISTER_PROMPT: &str = "该用户不存在，请输入密码进行注册: ";
const HELP_HINT: &str = "输入 /help 查看可用命令\n";
const MODE_HINT: &str = "当前为群聊模式，输入 /w 用户名 开始私聊\n";

/// Result of one successful handshake step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Username accepted, password requested
    PasswordRequested { registering: bool },
    /// New account created and logged in
    Registered(String),
    /// Existing account logged in
    LoggedIn(String),
}

impl ChatState {
    /// Handle a line typed at the username prompt
    pub fn submit_username(
        &mut self,
        key: &SessionKey,
        raw: &str,
    ) -> Result<AuthOutcome, ChatError> {
        let username = raw.trim();
        let min = self.config.chat.min_username_length;
        let max = self.config.chat.max_username_length;
        let len = username.chars().count();

        if len < min || len > max {
            self.send_to(
                key,
                format!(
                    "用户名长度必须在{}-{}个字符之间！\n请输入您的用户名（至少{}个字符）: ",
                    min, max, min
                ),
            );
            return Err(ChatError::UsernameLength { min, max });
        }

        let registering = !self.store.has_user(username);
        let session = self.session_mut(key)?;
        session.auth = AuthState::AwaitingPassword {
            username: username.to_string(),
            registering,
        };

        self.send_to(
            key,
            if registering {
                REGISTER_PROMPT
            } else {
                PASSWORD_PROMPT
            },
        );
        Ok(AuthOutcome::PasswordRequested { registering })
    }

    /// Handle a line typed at the password prompt
    pub fn submit_password(
        &mut self,
        key: &SessionKey,
        raw: &str,
    ) -> Result<AuthOutcome, ChatError> {
        let password = raw.trim();
        let (username, registering) = match &self.session(key)?.auth {
            AuthState::AwaitingPassword {
                username,
                registering,
            } => (username.clone(), *registering),
            _ => return Err(ChatError::UnknownSession(key.to_string())),
        };

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            self.send_to(
                key,
                format!("密码至少需要{}个字符！\n{}", MIN_PASSWORD_LENGTH, PASSWORD_PROMPT),
            );
            return Err(ChatError::PasswordTooShort(MIN_PASSWORD_LENGTH));
        }

        // Someone else may have registered the name since the username step
        if registering && !self.store.has_user(&username) {
            self.register(key, &username, password)
        } else {
            self.login(key, &username, password)
        }
    }

    fn register(
        &mut self,
        key: &SessionKey,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, ChatError> {
        let hash = hash_password(password, self.config.chat.password_scheme);
        // The account lives in memory even if users.json could not be rewritten
        let saved = self.store.add_user(UserRecord::new(username, hash));

        let user_key = self.authenticate(key, username)?;

        self.send_to(
            &user_key,
            format!("注册成功！欢迎 {} 加入{}！\n", username, self.group_name()),
        );
        self.send_to(&user_key, HELP_HINT);
        self.send_to(&user_key, MODE_HINT);
        self.replay_history(&user_key);
        self.announce_join(username);

        tracing::info!("{} 注册并加入聊天室", username);
        saved?;
        Ok(AuthOutcome::Registered(username.to_string()))
    }

    fn login(
        &mut self,
        key: &SessionKey,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome, ChatError> {
        let matches = self
            .store
            .user(username)
            .map(|user| verify_password(password, &user.password))
            .unwrap_or(false);

        if !matches {
            self.reset_to_username(key, "密码错误！\n")?;
            tracing::info!("Wrong password for {}", username);
            return Err(ChatError::WrongPassword(username.to_string()));
        }

        if self.registry.is_username_online(username) {
            self.reset_to_username(key, "该用户已在线，请勿重复登录！\n")?;
            tracing::info!("Rejected duplicate login for {}", username);
            return Err(ChatError::AlreadyOnline(username.to_string()));
        }

        let user_key = self.authenticate(key, username)?;

        self.send_to(&user_key, format!("欢迎回来，{}！\n", username));
        self.replay_history(&user_key);
        self.send_to(&user_key, HELP_HINT);
        self.send_to(&user_key, MODE_HINT);
        self.announce_join(username);

        tracing::info!("{} 登录并加入聊天室", username);
        Ok(AuthOutcome::LoggedIn(username.to_string()))
    }

    /// Mark the session authenticated and move it under its username
    fn authenticate(&mut self, key: &SessionKey, username: &str) -> Result<SessionKey, ChatError> {
        let user_key = SessionKey::User(username.to_string());
        self.registry.rekey(key, user_key.clone())?;

        let session = self.session_mut(&user_key)?;
        session.username = Some(username.to_string());
        session.auth = AuthState::Authenticated;
        Ok(user_key)
    }

    fn reset_to_username(&mut self, key: &SessionKey, notice: &str) -> Result<(), ChatError> {
        self.session_mut(key)?.auth = AuthState::AwaitingUsername;
        self.send_to(key, format!("{}{}", notice, USERNAME_PROMPT));
        Ok(())
    }

    fn announce_join(&mut self, username: &str) {
        if self.config.features.enable_join_leave_notifications {
            self.announce(&format!("{} 加入了聊天室！", username), Some(username));
        }
    }
}
