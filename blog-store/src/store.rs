use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use blog_gateway::{
    GatewayResult, ImageFile, ImageUpload, ListParams, NewPost, PageParams, Post, PostGateway,
    PostPage, PostPatch, PostStats,
};
use tracing::{debug, warn};

use crate::kind::OpKind;
use crate::pagination::Pagination;
use crate::state::{PostsState, ViewKind};

/// Задержка автосброса ошибки, если её не закрыли явно.
pub const DEFAULT_ERROR_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
/// Конверт результата диспетчеризации, возвращаемый вызывающей стороне.
///
/// Вытесненный вызов (см. [`PostStore`]) получает конверт со своим
/// собственным исходом, но состояние хранилища при этом не меняется.
pub struct DispatchResult<T> {
    /// Завершилась ли операция успехом на стороне шлюза.
    pub success: bool,
    /// Полезная нагрузка при успехе.
    pub data: Option<T>,
    /// Сообщение об ошибке при неудаче.
    pub error: Option<String>,
}

impl<T> DispatchResult<T> {
    fn completed(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }

    /// Разворачивает конверт в обычный `Result`.
    pub fn into_result(self) -> Result<T, String> {
        if self.success {
            self.data
                .ok_or_else(|| "dispatch succeeded without payload".to_string())
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "dispatch failed without message".to_string()))
        }
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    state: PostsState,
    /// Монотонные токены диспетчеризации: результат применяется только если
    /// его токен всё ещё последний для своей категории.
    tokens: [u64; OpKind::COUNT],
    /// Эпохи ошибок: таймер автосброса гасит только "свою" ошибку.
    error_epochs: [u64; OpKind::COUNT],
}

/// Хранилище синхронизации постов: единственный владелец состояния
/// представлений и единственный компонент, которому разрешено его менять.
///
/// Дешёвый для клонирования хэндл; все клоны разделяют одно состояние.
pub struct PostStore<G> {
    gateway: Arc<G>,
    inner: Arc<Mutex<StoreInner>>,
    error_ttl: Duration,
}

impl<G> Clone for PostStore<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            inner: Arc::clone(&self.inner),
            error_ttl: self.error_ttl,
        }
    }
}

impl<G: PostGateway> PostStore<G> {
    /// Создаёт хранилище поверх шлюза со стандартной задержкой автосброса
    /// ошибок.
    pub fn new(gateway: G) -> Self {
        Self::with_error_ttl(gateway, DEFAULT_ERROR_TTL)
    }

    /// Вариант с настраиваемой задержкой автосброса (используется в тестах).
    pub fn with_error_ttl(gateway: G, error_ttl: Duration) -> Self {
        Self {
            gateway: Arc::new(gateway),
            inner: Arc::new(Mutex::new(StoreInner::default())),
            error_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    /// Синхронная фаза `Pending`: флаг загрузки, сброс ошибки категории и
    /// выдача токена диспетчеризации.
    fn begin(&self, kind: OpKind) -> u64 {
        let mut inner = self.lock();
        inner.state.begin(kind);
        inner.tokens[kind.index()] += 1;
        let token = inner.tokens[kind.index()];
        debug!(kind = %kind, token, "operation dispatched");
        token
    }

    /// Фаза разрешения: сверка при успехе, запись ошибки при неудаче.
    /// Результат вытесненного вызова не трогает состояние.
    fn settle<T>(
        &self,
        kind: OpKind,
        token: u64,
        result: GatewayResult<T>,
        apply: impl FnOnce(&mut PostsState, &T),
    ) -> DispatchResult<T> {
        let mut inner = self.lock();
        if inner.tokens[kind.index()] != token {
            debug!(kind = %kind, token, "superseded result discarded");
            return match result {
                Ok(data) => DispatchResult::completed(data),
                Err(err) => DispatchResult::failed(err.to_string()),
            };
        }

        match result {
            Ok(data) => {
                inner.state.finish(kind);
                apply(&mut inner.state, &data);
                DispatchResult::completed(data)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(kind = %kind, error = %message, "operation failed");
                inner.state.fail(kind, message.clone());
                inner.error_epochs[kind.index()] += 1;
                let epoch = inner.error_epochs[kind.index()];
                drop(inner);
                self.schedule_error_clear(kind, epoch);
                DispatchResult::failed(message)
            }
        }
    }

    /// Таймер автосброса: гасит ошибку своей эпохи, если к моменту
    /// срабатывания её не закрыли и не заменили новой.
    fn schedule_error_clear(&self, kind: OpKind, epoch: u64) {
        let inner: Weak<Mutex<StoreInner>> = Arc::downgrade(&self.inner);
        let ttl = self.error_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut inner = inner.lock().expect("store mutex poisoned");
            if inner.error_epochs[kind.index()] == epoch {
                debug!(kind = %kind, "stale error auto-cleared");
                inner.state.clear_error(Some(kind));
            }
        });
    }

    // --- операции ---

    /// Создаёт пост; при успехе он попадает в начало глобального списка.
    pub async fn create_post(&self, input: NewPost) -> DispatchResult<Post> {
        let token = self.begin(OpKind::Create);
        let result = self.gateway.create_post(input).await;
        self.settle(OpKind::Create, token, result, |state, post| {
            state.apply_created(post.clone());
        })
    }

    /// Загружает страницу глобального списка.
    pub async fn list_posts(&self, params: ListParams) -> DispatchResult<PostPage> {
        let token = self.begin(OpKind::List);
        let result = self.gateway.list_posts(&params).await;
        self.settle(OpKind::List, token, result, |state, page| {
            state.apply_primary_page(
                page.posts.clone(),
                Pagination::of(params.page, params.limit, page.total),
            );
        })
    }

    /// Загружает страницу постов пользователя.
    pub async fn list_posts_by_user(
        &self,
        user_id: impl Into<String>,
        params: PageParams,
    ) -> DispatchResult<PostPage> {
        let user_id = user_id.into();
        let token = self.begin(OpKind::ListByUser);
        let result = self.gateway.list_posts_by_user(&user_id, &params).await;
        self.settle(OpKind::ListByUser, token, result, |state, page| {
            state.apply_user_page(
                user_id,
                page.posts.clone(),
                Pagination::of(params.page, params.limit, page.total),
            );
        })
    }

    /// Загружает пост в слот детального просмотра.
    pub async fn get_post(&self, id: &str) -> DispatchResult<Post> {
        let token = self.begin(OpKind::GetById);
        let result = self.gateway.get_post(id).await;
        self.settle(OpKind::GetById, token, result, |state, post| {
            state.apply_current(post.clone());
        })
    }

    /// Обновляет пост; при успехе все представления с этим id получают
    /// новые поля.
    pub async fn update_post(&self, id: &str, patch: PostPatch) -> DispatchResult<Post> {
        let token = self.begin(OpKind::Update);
        let result = self.gateway.update_post(id, &patch).await;
        self.settle(OpKind::Update, token, result, |state, post| {
            state.apply_updated(post.clone());
        })
    }

    /// Удаляет пост; при успехе он исчезает из всех представлений.
    pub async fn delete_post(&self, id: &str) -> DispatchResult<()> {
        let token = self.begin(OpKind::Delete);
        let result = self.gateway.delete_post(id).await;
        self.settle(OpKind::Delete, token, result, |state, _| {
            state.apply_deleted(id);
        })
    }

    /// Выполняет поиск постов.
    pub async fn search_posts(
        &self,
        query: impl Into<String>,
        params: PageParams,
    ) -> DispatchResult<PostPage> {
        let query = query.into();
        let token = self.begin(OpKind::Search);
        let result = self.gateway.search_posts(&query, &params).await;
        self.settle(OpKind::Search, token, result, |state, page| {
            state.apply_search_page(
                query,
                page.posts.clone(),
                Pagination::of(params.page, params.limit, page.total),
            );
        })
    }

    /// Загружает изображение; результат сохраняется до последующего
    /// create/update с этим URL.
    pub async fn upload_image(
        &self,
        file: ImageFile,
        post_id: Option<&str>,
    ) -> DispatchResult<ImageUpload> {
        let token = self.begin(OpKind::UploadImage);
        let result = self.gateway.upload_image(file, post_id).await;
        self.settle(OpKind::UploadImage, token, result, |state, upload| {
            state.apply_uploaded(upload.clone());
        })
    }

    /// Удаляет изображение из хранилища и забывает его URL.
    pub async fn delete_image(&self, path: &str) -> DispatchResult<()> {
        let token = self.begin(OpKind::DeleteImage);
        let result = self.gateway.delete_image(path).await;
        self.settle(OpKind::DeleteImage, token, result, |state, _| {
            state.apply_image_deleted();
        })
    }

    /// Загружает агрегированную статистику постов.
    pub async fn get_stats(&self, user_id: Option<&str>) -> DispatchResult<PostStats> {
        let token = self.begin(OpKind::GetStats);
        let result = self.gateway.post_stats(user_id).await;
        self.settle(OpKind::GetStats, token, result, |state, stats| {
            state.apply_stats(stats.clone());
        })
    }

    // --- явные действия ---

    /// Сбрасывает ошибку одной категории или все сразу.
    pub fn clear_error(&self, kind: Option<OpKind>) {
        self.lock().state.clear_error(kind);
    }

    /// Очищает слот детального просмотра.
    pub fn clear_current_post(&self) {
        self.lock().state.clear_current_post();
    }

    /// Очищает результаты поиска вместе с запросом и курсором.
    pub fn clear_search_results(&self) {
        self.lock().state.clear_search_results();
    }

    /// Очищает представление постов пользователя.
    pub fn clear_user_posts(&self) {
        self.lock().state.clear_user_posts();
    }

    /// Задаёт активную строку поиска.
    pub fn set_search_query(&self, query: impl Into<String>) {
        self.lock().state.set_search_query(query.into());
    }

    /// Задаёт выбранного пользователя.
    pub fn set_selected_user_id(&self, user_id: Option<String>) {
        self.lock().state.set_selected_user_id(user_id);
    }

    /// Сбрасывает прогресс и результат загрузки изображения.
    pub fn reset_upload_state(&self) {
        self.lock().state.reset_upload_state();
    }

    /// Обновляет прогресс загрузки (для вызывающих, считающих его сами).
    pub fn update_upload_progress(&self, progress: u8) {
        self.lock().state.update_upload_progress(progress);
    }

    /// Возвращает хранилище в исходное состояние.
    pub fn reset(&self) {
        self.lock().state.reset();
    }

    // --- доступ на чтение ---

    /// Полный снимок состояния.
    pub fn snapshot(&self) -> PostsState {
        self.lock().state.clone()
    }

    /// Глобальный список постов.
    pub fn posts(&self) -> Vec<Post> {
        self.lock().state.posts.clone()
    }

    /// Посты выбранного пользователя.
    pub fn user_posts(&self) -> Vec<Post> {
        self.lock().state.user_posts.clone()
    }

    /// Результаты текущего поиска.
    pub fn search_results(&self) -> Vec<Post> {
        self.lock().state.search_results.clone()
    }

    /// Пост в слоте детального просмотра.
    pub fn current_post(&self) -> Option<Post> {
        self.lock().state.current_post.clone()
    }

    /// Курсор пагинации представления.
    pub fn pagination(&self, view: ViewKind) -> Pagination {
        self.lock().state.view_pagination(view)
    }

    /// Идёт ли операция данной категории.
    pub fn loading(&self, kind: OpKind) -> bool {
        self.lock().state.loading(kind)
    }

    /// Последняя ошибка данной категории.
    pub fn error(&self, kind: OpKind) -> Option<String> {
        self.lock().state.error(kind).map(str::to_string)
    }

    /// Идёт ли хотя бы одна операция.
    pub fn is_any_loading(&self) -> bool {
        self.lock().state.is_any_loading()
    }

    /// Есть ли незакрытая ошибка хотя бы одной категории.
    pub fn has_any_error(&self) -> bool {
        self.lock().state.has_any_error()
    }

    /// Последняя загруженная статистика.
    pub fn stats(&self) -> PostStats {
        self.lock().state.stats.clone()
    }

    /// Активная строка поиска.
    pub fn search_query(&self) -> String {
        self.lock().state.search_query.clone()
    }

    /// Пользователь, чьи посты загружены.
    pub fn selected_user_id(&self) -> Option<String> {
        self.lock().state.selected_user_id.clone()
    }

    /// Прогресс загрузки изображения.
    pub fn upload_progress(&self) -> u8 {
        self.lock().state.upload_progress
    }

    /// Результат последней успешной загрузки изображения.
    pub fn uploaded_image(&self) -> Option<ImageUpload> {
        self.lock().state.uploaded_image.clone()
    }

    /// Ищет пост по id во всех списковых представлениях.
    pub fn find_post(&self, id: &str) -> Option<Post> {
        self.lock().state.find_post(id).cloned()
    }

    /// Есть ли у представления следующая страница.
    pub fn can_load_more(&self, view: ViewKind) -> bool {
        self.pagination(view).can_load_more()
    }

    /// Номер следующей страницы представления.
    pub fn next_page(&self, view: ViewKind) -> u32 {
        self.pagination(view).next_page()
    }
}
