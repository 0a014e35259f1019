use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blog_gateway::{
    GatewayError, GatewayResult, ImageFile, ImageUpload, ListParams, NewPost, PageParams, Post,
    PostGateway, PostPage, PostPatch, PostStats, PostStatus,
};
use blog_store::{OpKind, PostStore, ViewKind};
use chrono::Utc;
use tokio::sync::oneshot;

type Queue<T> = Arc<Mutex<VecDeque<GatewayResult<T>>>>;
type GateQueue<T> = Arc<Mutex<VecDeque<oneshot::Receiver<GatewayResult<T>>>>>;

/// Скриптуемый двойник шлюза: каждая операция снимает заранее заготовленный
/// результат из своей очереди; операции с "воротами" ждут, пока тест не
/// отправит результат через канал.
#[derive(Clone, Default)]
struct FakeGateway {
    create_results: Queue<Post>,
    list_results: Queue<PostPage>,
    user_results: Queue<PostPage>,
    get_results: Queue<Post>,
    update_results: Queue<Post>,
    delete_results: Queue<()>,
    search_results: Queue<PostPage>,
    search_gates: GateQueue<PostPage>,
    upload_results: Queue<ImageUpload>,
    upload_gates: GateQueue<ImageUpload>,
    delete_image_results: Queue<()>,
    stats_results: Queue<PostStats>,
}

fn push<T>(queue: &Queue<T>, result: GatewayResult<T>) {
    queue.lock().expect("queue mutex poisoned").push_back(result);
}

fn pop<T>(queue: &Queue<T>, operation: &str) -> GatewayResult<T> {
    queue
        .lock()
        .expect("queue mutex poisoned")
        .pop_front()
        .unwrap_or_else(|| panic!("unexpected {operation} call"))
}

fn pop_gate<T>(gates: &GateQueue<T>) -> Option<oneshot::Receiver<GatewayResult<T>>> {
    gates.lock().expect("gate mutex poisoned").pop_front()
}

fn gate_len<T>(gates: &GateQueue<T>) -> usize {
    gates.lock().expect("gate mutex poisoned").len()
}

#[async_trait]
impl PostGateway for FakeGateway {
    async fn create_post(&self, _input: NewPost) -> GatewayResult<Post> {
        pop(&self.create_results, "create_post")
    }

    async fn list_posts(&self, _params: &ListParams) -> GatewayResult<PostPage> {
        pop(&self.list_results, "list_posts")
    }

    async fn list_posts_by_user(
        &self,
        _user_id: &str,
        _params: &PageParams,
    ) -> GatewayResult<PostPage> {
        pop(&self.user_results, "list_posts_by_user")
    }

    async fn get_post(&self, _id: &str) -> GatewayResult<Post> {
        pop(&self.get_results, "get_post")
    }

    async fn update_post(&self, _id: &str, _patch: &PostPatch) -> GatewayResult<Post> {
        pop(&self.update_results, "update_post")
    }

    async fn delete_post(&self, _id: &str) -> GatewayResult<()> {
        pop(&self.delete_results, "delete_post")
    }

    async fn search_posts(&self, _query: &str, _params: &PageParams) -> GatewayResult<PostPage> {
        if let Some(gate) = pop_gate(&self.search_gates) {
            return gate.await.expect("search gate sender dropped");
        }
        pop(&self.search_results, "search_posts")
    }

    async fn upload_image(
        &self,
        _file: ImageFile,
        _post_id: Option<&str>,
    ) -> GatewayResult<ImageUpload> {
        if let Some(gate) = pop_gate(&self.upload_gates) {
            return gate.await.expect("upload gate sender dropped");
        }
        pop(&self.upload_results, "upload_image")
    }

    async fn delete_image(&self, _path: &str) -> GatewayResult<()> {
        pop(&self.delete_image_results, "delete_image")
    }

    async fn post_stats(&self, _user_id: Option<&str>) -> GatewayResult<PostStats> {
        pop(&self.stats_results, "post_stats")
    }
}

fn sample_post(id: &str, title: &str) -> Post {
    Post {
        id: id.to_string(),
        title: title.to_string(),
        content: "content".to_string(),
        featured_image: None,
        author_id: "u1".to_string(),
        status: PostStatus::Draft,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        published_at: None,
    }
}

fn page(posts: Vec<Post>, total: u64) -> PostPage {
    PostPage { posts, total }
}

fn new_post_input(title: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: "content".to_string(),
        featured_image: None,
        author_id: "u1".to_string(),
        status: PostStatus::Draft,
    }
}

#[tokio::test]
async fn created_post_lands_at_head_of_primary_view() {
    let fake = FakeGateway::default();
    push(&fake.list_results, Ok(page(vec![sample_post("p0", "old")], 1)));
    push(&fake.create_results, Ok(sample_post("p1", "Hello")));
    let store = PostStore::new(fake);

    store.list_posts(ListParams::default()).await;
    let result = store.create_post(new_post_input("Hello")).await;

    assert!(result.success);
    assert_eq!(result.data.expect("post must be returned").id, "p1");

    let posts = store.posts();
    assert_eq!(posts[0].id, "p1");
    assert_eq!(posts.len(), 2);
    assert_eq!(store.pagination(ViewKind::Primary).total, 2);
    assert!(store.user_posts().is_empty());
    assert!(store.search_results().is_empty());
    assert!(!store.loading(OpKind::Create));
}

#[tokio::test]
async fn user_page_fills_by_user_view_with_cursor() {
    let fake = FakeGateway::default();
    let posts = vec![
        sample_post("p1", "a"),
        sample_post("p2", "b"),
        sample_post("p3", "c"),
    ];
    push(&fake.user_results, Ok(page(posts, 3)));
    let store = PostStore::new(fake);

    let result = store.list_posts_by_user("u1", PageParams::default()).await;

    assert!(result.success);
    assert_eq!(store.user_posts().len(), 3);
    assert_eq!(store.selected_user_id().as_deref(), Some("u1"));

    let cursor = store.pagination(ViewKind::ByUser);
    assert_eq!(cursor.total, 3);
    assert_eq!(cursor.total_pages, 1);
    assert!(!store.can_load_more(ViewKind::ByUser));
    assert_eq!(store.next_page(ViewKind::ByUser), 2);
}

#[tokio::test]
async fn update_keeps_every_view_consistent() {
    let fake = FakeGateway::default();
    push(&fake.list_results, Ok(page(vec![sample_post("p1", "old")], 1)));
    push(&fake.get_results, Ok(sample_post("p1", "old")));
    let mut published = sample_post("p1", "old");
    published.status = PostStatus::Published;
    published.published_at = Some(Utc::now());
    push(&fake.update_results, Ok(published));
    let store = PostStore::new(fake);

    store.list_posts(ListParams::default()).await;
    store.get_post("p1").await;

    let patch = PostPatch {
        status: Some(PostStatus::Published),
        ..PostPatch::default()
    };
    let result = store.update_post("p1", patch).await;

    assert!(result.success);
    assert_eq!(store.posts()[0].status, PostStatus::Published);
    let current = store.current_post().expect("current must survive update");
    assert_eq!(current.status, PostStatus::Published);
    assert!(current.published_at.is_some());
}

#[tokio::test]
async fn delete_removes_post_from_all_views_in_one_step() {
    let fake = FakeGateway::default();
    push(&fake.list_results, Ok(page(vec![sample_post("p1", "a")], 1)));
    push(&fake.user_results, Ok(page(vec![sample_post("p1", "a")], 1)));
    push(&fake.get_results, Ok(sample_post("p1", "a")));
    push(&fake.delete_results, Ok(()));
    let store = PostStore::new(fake);

    store.list_posts(ListParams::default()).await;
    store.list_posts_by_user("u1", PageParams::default()).await;
    store.get_post("p1").await;

    let result = store.delete_post("p1").await;

    assert!(result.success);
    assert!(store.posts().is_empty());
    assert!(store.user_posts().is_empty());
    assert!(store.current_post().is_none());
    assert!(store.find_post("p1").is_none());
    assert_eq!(store.pagination(ViewKind::Primary).total, 0);
    assert_eq!(store.pagination(ViewKind::ByUser).total, 0);
}

#[tokio::test]
async fn rejected_operation_keeps_prior_view_state() {
    let fake = FakeGateway::default();
    push(
        &fake.search_results,
        Ok(page(vec![sample_post("p1", "rust")], 1)),
    );
    push(
        &fake.search_results,
        Err(GatewayError::InvalidRequest("timeout".to_string())),
    );
    let store = PostStore::new(fake);

    store.search_posts("rust", PageParams::default()).await;
    let before = store.search_results();

    let result = store.search_posts("golang", PageParams::default()).await;

    assert!(!result.success);
    let error = store.error(OpKind::Search).expect("error must be recorded");
    assert!(error.contains("timeout"));
    assert_eq!(store.search_results().len(), before.len());
    assert_eq!(store.search_results()[0].id, before[0].id);
    // запрос остаётся прежним: сверка не применялась
    assert_eq!(store.search_query(), "rust");
}

#[tokio::test]
async fn error_is_scoped_to_its_operation_kind() {
    let fake = FakeGateway::default();
    let (upload_tx, upload_rx) = oneshot::channel();
    fake.upload_gates
        .lock()
        .expect("gate mutex poisoned")
        .push_back(upload_rx);
    push(
        &fake.delete_results,
        Err(GatewayError::InvalidRequest("forbidden".to_string())),
    );
    let store = PostStore::new(fake.clone());

    let upload_store = store.clone();
    let upload = tokio::spawn(async move {
        upload_store
            .upload_image(
                ImageFile {
                    file_name: "img.png".to_string(),
                    content_type: "image/png".to_string(),
                    bytes: vec![1, 2, 3],
                },
                None,
            )
            .await
    });
    while gate_len(&fake.upload_gates) != 0 {
        tokio::task::yield_now().await;
    }

    let result = store.delete_post("p1").await;

    assert!(!result.success);
    assert!(store.error(OpKind::Delete).is_some());
    // параллельная загрузка не затронута
    assert!(store.loading(OpKind::UploadImage));
    assert!(store.error(OpKind::UploadImage).is_none());
    for kind in OpKind::ALL {
        if kind != OpKind::Delete {
            assert!(store.error(kind).is_none(), "unexpected error for {kind}");
        }
    }

    upload_tx
        .send(Ok(ImageUpload {
            url: "https://cdn/img.png".to_string(),
            path: "featured/img.png".to_string(),
        }))
        .expect("upload gate must be awaited");
    let upload = upload.await.expect("upload task must not panic");
    assert!(upload.success);
    assert_eq!(store.upload_progress(), 100);
    assert!(store.uploaded_image().is_some());
}

#[tokio::test]
async fn later_search_dispatch_wins_over_slower_earlier_one() {
    let fake = FakeGateway::default();
    let (tx_a, rx_a) = oneshot::channel();
    let (tx_b, rx_b) = oneshot::channel();
    {
        let mut gates = fake.search_gates.lock().expect("gate mutex poisoned");
        gates.push_back(rx_a);
        gates.push_back(rx_b);
    }
    let store = PostStore::new(fake.clone());

    let store_a = store.clone();
    let first = tokio::spawn(async move {
        store_a.search_posts("x", PageParams::default()).await
    });
    while gate_len(&fake.search_gates) != 1 {
        tokio::task::yield_now().await;
    }

    let store_b = store.clone();
    let second = tokio::spawn(async move {
        store_b.search_posts("y", PageParams::default()).await
    });
    while gate_len(&fake.search_gates) != 0 {
        tokio::task::yield_now().await;
    }

    // Второй запрос завершается первым и выигрывает.
    tx_b.send(Ok(page(vec![sample_post("py", "y hit")], 1)))
        .expect("second gate must be awaited");
    let second = second.await.expect("second task must not panic");
    assert!(second.success);

    // Медленный первый запрос завершается позже и отбрасывается.
    tx_a.send(Ok(page(vec![sample_post("px", "x hit")], 1)))
        .expect("first gate must be awaited");
    let first = first.await.expect("first task must not panic");
    assert!(first.success, "superseded call still reports its own outcome");

    assert_eq!(store.search_query(), "y");
    let results = store.search_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "py");
    assert!(!store.loading(OpKind::Search));
}

#[tokio::test(start_paused = true)]
async fn error_auto_clears_after_ttl() {
    let fake = FakeGateway::default();
    push(
        &fake.search_results,
        Err(GatewayError::InvalidRequest("timeout".to_string())),
    );
    let store = PostStore::with_error_ttl(fake, Duration::from_secs(5));

    let result = store.search_posts("golang", PageParams::default()).await;
    assert!(!result.success);
    assert!(store.error(OpKind::Search).is_some());
    assert!(store.has_any_error());

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(store.error(OpKind::Search).is_none());
    assert!(!store.has_any_error());
    assert!(store.search_results().is_empty());
}

#[tokio::test(start_paused = true)]
async fn newer_error_survives_stale_auto_clear_timer() {
    let fake = FakeGateway::default();
    push(
        &fake.delete_results,
        Err(GatewayError::InvalidRequest("first".to_string())),
    );
    push(
        &fake.delete_results,
        Err(GatewayError::InvalidRequest("second".to_string())),
    );
    let store = PostStore::with_error_ttl(fake, Duration::from_secs(5));

    store.delete_post("p1").await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    store.delete_post("p2").await;

    // Таймер первой ошибки срабатывает на 5-й секунде и не должен погасить
    // более новую ошибку.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let error = store.error(OpKind::Delete).expect("newer error must survive");
    assert!(error.contains("second"));

    // Своя пятисекундная задержка второй ошибки истекает на 8-й секунде.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(store.error(OpKind::Delete).is_none());
}

#[tokio::test(start_paused = true)]
async fn explicit_clear_preempts_auto_clear_timer() {
    let fake = FakeGateway::default();
    push(
        &fake.create_results,
        Err(GatewayError::InvalidRequest("boom".to_string())),
    );
    let store = PostStore::with_error_ttl(fake, Duration::from_secs(5));

    store.create_post(new_post_input("Hello")).await;
    assert!(store.error(OpKind::Create).is_some());

    store.clear_error(Some(OpKind::Create));
    assert!(store.error(OpKind::Create).is_none());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(store.error(OpKind::Create).is_none());
}

#[tokio::test]
async fn continuation_page_appends_to_primary_view() {
    let fake = FakeGateway::default();
    push(
        &fake.list_results,
        Ok(page(vec![sample_post("p1", "a"), sample_post("p2", "b")], 4)),
    );
    push(
        &fake.list_results,
        Ok(page(vec![sample_post("p3", "c"), sample_post("p4", "d")], 4)),
    );
    let store = PostStore::new(fake);

    let params = ListParams {
        limit: 2,
        ..ListParams::default()
    };
    store.list_posts(params).await;
    assert!(store.can_load_more(ViewKind::Primary));

    let next = ListParams {
        page: store.next_page(ViewKind::Primary),
        limit: 2,
        ..ListParams::default()
    };
    store.list_posts(next).await;

    let ids: Vec<String> = store.posts().iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, ["p1", "p2", "p3", "p4"]);
    assert!(!store.can_load_more(ViewKind::Primary));
}

#[tokio::test]
async fn stats_and_image_lifecycle_do_not_touch_views() {
    let fake = FakeGateway::default();
    push(&fake.list_results, Ok(page(vec![sample_post("p1", "a")], 1)));
    push(
        &fake.upload_results,
        Ok(ImageUpload {
            url: "https://cdn/img.png".to_string(),
            path: "featured/img.png".to_string(),
        }),
    );
    push(&fake.delete_image_results, Ok(()));
    push(
        &fake.stats_results,
        Ok(PostStats {
            total_posts: 10,
            published_posts: 7,
            draft_posts: 3,
            user_id: None,
        }),
    );
    let store = PostStore::new(fake);

    store.list_posts(ListParams::default()).await;

    store
        .upload_image(
            ImageFile {
                file_name: "img.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: vec![1],
            },
            Some("p1"),
        )
        .await;
    assert_eq!(store.upload_progress(), 100);
    let uploaded = store.uploaded_image().expect("upload must be recorded");

    store.delete_image(&uploaded.path).await;
    assert!(store.uploaded_image().is_none());

    let stats = store.get_stats(None).await;
    assert!(stats.success);
    assert_eq!(store.stats().total_posts, 10);
    assert_eq!(store.stats().published_posts, 7);

    // Представления постов не затронуты ни одной из трёх операций.
    assert_eq!(store.posts().len(), 1);
    assert!(store.posts()[0].featured_image.is_none());
}

#[tokio::test]
async fn reset_returns_store_to_initial_state() {
    let fake = FakeGateway::default();
    push(&fake.list_results, Ok(page(vec![sample_post("p1", "a")], 1)));
    push(
        &fake.search_results,
        Err(GatewayError::InvalidRequest("boom".to_string())),
    );
    let store = PostStore::new(fake);

    store.list_posts(ListParams::default()).await;
    store.search_posts("q", PageParams::default()).await;
    assert!(store.has_any_error());

    store.reset();

    let snapshot = store.snapshot();
    assert!(snapshot.posts.is_empty());
    assert!(snapshot.current_post.is_none());
    assert!(!snapshot.has_any_error());
    assert!(!snapshot.is_any_loading());
    assert_eq!(store.pagination(ViewKind::Primary).total, 0);
}
