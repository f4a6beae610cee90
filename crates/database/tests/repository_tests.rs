use urlyn_database::test_utils::{create_test_db, create_test_user};
use urlyn_database::{
    ChatRepository, ChatType, MemberRepository, MemberRole, MessageRepository, NewAttachment,
    NewGroupChat, NewMessage, UserRepository,
};

fn text_message(content: &str) -> NewMessage {
    NewMessage {
        content: content.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn direct_chat_is_created_once_per_pair() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());

    let (first, created) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();
    assert!(created);
    assert_eq!(first.chat_type, ChatType::Direct);

    // Same pair in either order resolves to the same chat
    let (second, created) = chats.get_or_create_direct(bob.id, alice.id).await.unwrap();
    assert!(!created);
    assert_eq!(second.public_id, first.public_id);

    let members = MemberRepository::new(pool.clone());
    let ids = members.user_ids(first.id).await.unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&alice.id) && ids.contains(&bob.id));
}

#[tokio::test]
async fn direct_chat_restores_a_departed_member() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let members = MemberRepository::new(pool.clone());

    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();
    assert!(members.remove(chat.id, bob.id).await.unwrap());

    // Requesting the pair chat again brings the departed member back
    let (reopened, restored) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();
    assert!(restored);
    assert_eq!(reopened.public_id, chat.public_id);
    assert!(members.find(chat.id, bob.id).await.unwrap().is_some());
    assert_eq!(members.member_count(chat.id).await.unwrap(), 2);
}

#[tokio::test]
async fn direct_chat_comes_back_after_both_parties_leave() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let members = MemberRepository::new(pool.clone());

    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();
    members.remove(chat.id, alice.id).await.unwrap();
    members.remove(chat.id, bob.id).await.unwrap();
    chats.deactivate(chat.id).await.unwrap();
    assert!(chats.find_by_public_id(&chat.public_id).await.unwrap().is_none());

    // The emptied chat revives instead of colliding with its own pair key
    let (reopened, restored) = chats.get_or_create_direct(bob.id, alice.id).await.unwrap();
    assert!(restored);
    assert_eq!(reopened.public_id, chat.public_id);
    assert!(reopened.is_active);
    assert_eq!(members.member_count(chat.id).await.unwrap(), 2);

    // And the revived chat behaves normally again
    let (again, restored) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();
    assert!(!restored);
    assert_eq!(again.public_id, chat.public_id);
}

#[tokio::test]
async fn direct_chat_with_self_is_rejected() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;

    let chats = ChatRepository::new(pool);
    let result = chats.get_or_create_direct(alice.id, alice.id).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn group_chat_creator_becomes_admin() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let chat = chats
        .create_group(
            alice.id,
            NewGroupChat {
                name: "Research".to_string(),
                description: None,
                chat_type: ChatType::Group,
                item_id: None,
                item_type: None,
                member_ids: vec![bob.id],
            },
        )
        .await
        .unwrap();

    let members = MemberRepository::new(pool.clone());
    let creator = members.find(chat.id, alice.id).await.unwrap().unwrap();
    assert!(creator.is_admin());

    let other = members.find(chat.id, bob.id).await.unwrap().unwrap();
    assert_eq!(other.role, MemberRole::Member);
    assert_eq!(members.admin_count(chat.id).await.unwrap(), 1);
}

#[tokio::test]
async fn sending_a_message_bumps_chat_counters() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();
    assert_eq!(chat.message_count, 0);

    let messages = MessageRepository::new(pool.clone());
    let message = messages
        .create(chat.id, alice.id, text_message("hello"))
        .await
        .unwrap();
    assert_eq!(message.content, "hello");
    assert_eq!(message.sender_id, alice.id);

    let refreshed = chats
        .find_by_public_id(&chat.public_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.message_count, 1);
    assert_eq!(refreshed.last_message_at.as_deref(), Some(message.created_at.as_str()));
}

#[tokio::test]
async fn history_lists_in_persistence_order_and_skips_deleted() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();

    let messages = MessageRepository::new(pool.clone());
    let first = messages
        .create(chat.id, alice.id, text_message("one"))
        .await
        .unwrap();
    let second = messages
        .create(chat.id, bob.id, text_message("two"))
        .await
        .unwrap();
    let third = messages
        .create(chat.id, alice.id, text_message("three"))
        .await
        .unwrap();

    messages.soft_delete(second.id, bob.id).await.unwrap();

    let history = messages.list_for_chat(chat.id, 50).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "three"]);
    assert_eq!(history[0].public_id, first.public_id);
    assert_eq!(history[1].public_id, third.public_id);

    // Deleted messages also disappear from direct lookup
    assert!(messages
        .find_by_public_id(&second.public_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn history_limit_keeps_the_most_recent_messages() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();

    let messages = MessageRepository::new(pool.clone());
    for i in 0..5 {
        messages
            .create(chat.id, alice.id, text_message(&format!("msg-{i}")))
            .await
            .unwrap();
    }

    let history = messages.list_for_chat(chat.id, 3).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["msg-2", "msg-3", "msg-4"]);
}

#[tokio::test]
async fn edit_records_the_original_content_once() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();

    let messages = MessageRepository::new(pool.clone());
    let message = messages
        .create(chat.id, alice.id, text_message("draft"))
        .await
        .unwrap();

    let edited = messages.edit(message.id, "first edit").await.unwrap();
    assert!(edited.is_edited);
    assert_eq!(edited.content, "first edit");
    assert_eq!(edited.original_content.as_deref(), Some("draft"));

    let edited_again = messages.edit(message.id, "second edit").await.unwrap();
    assert_eq!(edited_again.content, "second edit");
    assert_eq!(edited_again.original_content.as_deref(), Some("draft"));
}

#[tokio::test]
async fn reaction_toggle_removes_on_repeat_and_replaces_on_change() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();

    let messages = MessageRepository::new(pool.clone());
    let message = messages
        .create(chat.id, alice.id, text_message("react to me"))
        .await
        .unwrap();

    let added = messages
        .toggle_reaction(message.id, bob.id, "👍")
        .await
        .unwrap();
    assert_eq!(added.unwrap().reaction, "👍");

    let replaced = messages
        .toggle_reaction(message.id, bob.id, "🎉")
        .await
        .unwrap();
    assert_eq!(replaced.unwrap().reaction, "🎉");

    let removed = messages
        .toggle_reaction(message.id, bob.id, "🎉")
        .await
        .unwrap();
    assert!(removed.is_none());
}

#[tokio::test]
async fn read_markers_are_idempotent_per_user() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();

    let messages = MessageRepository::new(pool.clone());
    let message = messages
        .create(chat.id, alice.id, text_message("read me"))
        .await
        .unwrap();

    assert!(messages.mark_read(message.id, bob.id).await.unwrap());
    assert!(!messages.mark_read(message.id, bob.id).await.unwrap());

    let receipts = messages.read_receipts(message.id).await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].user_id, bob.id);
}

#[tokio::test]
async fn attachments_round_trip_with_the_message() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();

    let messages = MessageRepository::new(pool.clone());
    let message = messages
        .create(
            chat.id,
            alice.id,
            NewMessage {
                content: String::new(),
                attachments: vec![NewAttachment {
                    url: "https://cdn.urlyn.app/f/abc".to_string(),
                    file_name: Some("notes.pdf".to_string()),
                    file_type: Some("application/pdf".to_string()),
                    file_size: Some(2048),
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(message.attachments.len(), 1);

    let history = messages.list_for_chat(chat.id, 50).await.unwrap();
    assert_eq!(history[0].attachments.len(), 1);
    assert_eq!(history[0].attachments[0].url, "https://cdn.urlyn.app/f/abc");
}

#[tokio::test]
async fn reply_targets_resolve_to_public_ids() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();

    let messages = MessageRepository::new(pool.clone());
    let parent = messages
        .create(chat.id, alice.id, text_message("question"))
        .await
        .unwrap();

    let reply = messages
        .create(
            chat.id,
            bob.id,
            NewMessage {
                content: "answer".to_string(),
                reply_to: Some(parent.public_id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(reply.reply_to.as_deref(), Some(parent.public_id.as_str()));

    // Replying to a message from a different chat fails
    let other = create_test_user(&pool, "carol@example.com", "Carol").await;
    let (other_chat, _) = chats.get_or_create_direct(alice.id, other.id).await.unwrap();
    let result = messages
        .create(
            other_chat.id,
            alice.id,
            NewMessage {
                content: "cross-chat reply".to_string(),
                reply_to: Some(parent.public_id.clone()),
                ..Default::default()
            },
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn membership_add_is_idempotent_and_remove_reports_absence() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;
    let carol = create_test_user(&pool, "carol@example.com", "Carol").await;

    let chats = ChatRepository::new(pool.clone());
    let chat = chats
        .create_group(
            alice.id,
            NewGroupChat {
                name: "Team".to_string(),
                description: None,
                chat_type: ChatType::Group,
                item_id: None,
                item_type: None,
                member_ids: vec![bob.id],
            },
        )
        .await
        .unwrap();

    let members = MemberRepository::new(pool.clone());
    members.add(chat.id, carol.id, MemberRole::Member).await.unwrap();
    members.add(chat.id, carol.id, MemberRole::Member).await.unwrap();
    assert_eq!(members.member_count(chat.id).await.unwrap(), 3);

    assert!(members.remove(chat.id, carol.id).await.unwrap());
    assert!(!members.remove(chat.id, carol.id).await.unwrap());
    assert_eq!(members.member_count(chat.id).await.unwrap(), 2);
}

#[tokio::test]
async fn deactivated_chats_drop_out_of_user_listings() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;
    let bob = create_test_user(&pool, "bob@example.com", "Bob").await;

    let chats = ChatRepository::new(pool.clone());
    let (chat, _) = chats.get_or_create_direct(alice.id, bob.id).await.unwrap();
    assert_eq!(chats.find_for_user(alice.id).await.unwrap().len(), 1);

    chats.deactivate(chat.id).await.unwrap();
    assert!(chats.find_for_user(alice.id).await.unwrap().is_empty());
    assert!(chats
        .find_by_public_id(&chat.public_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn user_lookup_by_either_id() {
    let (pool, _guard) = create_test_db().await;
    let alice = create_test_user(&pool, "alice@example.com", "Alice").await;

    let users = UserRepository::new(pool);
    assert!(users.exists(alice.id).await.unwrap());
    assert!(!users.exists(alice.id + 999).await.unwrap());

    let by_public = users
        .find_by_public_id(&alice.public_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_public.id, alice.id);
    assert_eq!(by_public.email, "alice@example.com");
}
