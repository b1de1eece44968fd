// End-to-end tests over real TCP connections

mod test_utils;

use nuoke::chat::{ChatConfig, MessageKind};
use test_utils::*;

#[tokio::test]
async fn test_group_and_whisper_over_tcp() {
    let dir = temp_dir();
    let server = start_server(ChatConfig::default(), dir.path()).await;

    let mut alice = TestClient::login(&server, "alice", "secret").await;
    let mut bob = TestClient::login(&server, "bob", "hunter2").await;
    alice.expect("bob 加入了聊天室！\n").await;

    bob.send("hello everyone").await;
    alice.expect("] bob: hello everyone\n").await;

    bob.send("/w alice").await;
    bob.expect("已切换到与 alice 的私聊模式\n").await;

    bob.send("just for you").await;
    alice.expect("[私聊] bob: just for you\n").await;
    bob.expect("[你 -> alice]: just for you\n").await;

    bob.send("/users").await;
    let listing = bob.expect("\n").await;
    assert!(listing.starts_with("在线用户 (2): "), "{:?}", listing);

    let state = server.shutdown().await.unwrap();
    let kinds: Vec<MessageKind> = state.store().history().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![MessageKind::Group, MessageKind::Whisper]);
}

#[tokio::test]
async fn test_second_login_rejected_while_online() {
    let dir = temp_dir();
    let server = start_server(ChatConfig::default(), dir.path()).await;

    let _alice = TestClient::login(&server, "alice", "secret").await;

    let mut intruder = TestClient::connect(&server).await;
    intruder.expect("请输入您的用户名: ").await;
    intruder.send("alice").await;
    intruder.expect("请输入密码: ").await;
    intruder.send("secret").await;
    intruder.expect("该用户已在线，请勿重复登录！\n请输入您的用户名: ").await;

    // Back at the username prompt: a different name starts a registration
    intruder.send("mallory").await;
    intruder.expect("该用户不存在，请输入密码进行注册: ").await;

    let online = server
        .handle()
        .query(|state| state.registry().list_online_usernames())
        .await
        .unwrap();
    assert_eq!(online, vec!["alice".to_string()]);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_quit_notifies_remaining_users() {
    let dir = temp_dir();
    let server = start_server(ChatConfig::default(), dir.path()).await;

    let mut alice = TestClient::login(&server, "alice", "secret").await;
    let mut bob = TestClient::login(&server, "bob", "secret").await;
    alice.expect("bob 加入了聊天室！\n").await;

    bob.send("/quit").await;
    assert!(bob.closed().await);

    alice.expect("bob 离开了Nuoke聊天群\n").await;
    alice.expect("在线用户 (1): alice\n").await;
    assert!(wait_until(&server, |state| !state.registry().is_username_online("bob")).await);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_accounts_and_history_survive_restart() {
    let dir = temp_dir();

    let server = start_server(ChatConfig::default(), dir.path()).await;
    let mut alice = TestClient::login(&server, "alice", "secret").await;
    alice.send("remember me").await;
    assert!(wait_until(&server, |state| state.store().message_count() == 1).await);
    server.shutdown().await.unwrap();

    let server = start_server(ChatConfig::default(), dir.path()).await;
    let mut again = TestClient::connect(&server).await;
    again.expect("请输入您的用户名: ").await;
    again.send("alice").await;
    again.expect("请输入密码: ").await;

    again.send("wrong").await;
    again.expect("密码错误！\n请输入您的用户名: ").await;

    again.send("alice").await;
    again.expect("请输入密码: ").await;
    again.send("secret").await;
    again.expect("欢迎回来，alice！\n").await;
    again.expect("] alice: remember me\n").await;

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_custom_group_name_and_bounds() {
    let dir = temp_dir();
    let mut config = ChatConfig::default();
    config.chat.group_name = "测试群".to_string();
    config.chat.min_username_length = 4;
    config.chat.max_username_length = 6;
    let server = start_server(config, dir.path()).await;

    let mut client = TestClient::connect(&server).await;
    client.expect("欢迎来到测试群！\n请输入您的用户名: ").await;
    client.send("bob").await;
    client
        .expect("用户名长度必须在4-6个字符之间！\n请输入您的用户名（至少4个字符）: ")
        .await;
    client.send("bobby").await;
    client.expect("该用户不存在，请输入密码进行注册: ").await;
    client.send("pw").await;
    client.expect("密码至少需要3个字符！\n请输入密码: ").await;
    client.send("pw1").await;
    client.expect("注册成功！欢迎 bobby 加入测试群！\n").await;

    server.shutdown().await.unwrap();
}
