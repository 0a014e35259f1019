use blog_gateway::{ImageUpload, Post, PostStats};
use tracing::debug;

use crate::kind::OpKind;
use crate::pagination::Pagination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Списковое представление постов.
pub enum ViewKind {
    /// Глобальный список.
    Primary,
    /// Посты выбранного пользователя.
    ByUser,
    /// Результаты поиска.
    Search,
}

#[derive(Debug, Clone, Default)]
/// Снимок состояния синхронизации: четыре представления одних и тех же
/// постов, курсоры пагинации, статусы операций и состояние загрузки
/// изображения.
///
/// Мутируется только правилами сверки (`apply_*`) и явными действиями —
/// это единственный способ изменить данные постов.
pub struct PostsState {
    /// Глобальный список постов.
    pub posts: Vec<Post>,
    /// Выбранный пост для детального просмотра.
    pub current_post: Option<Post>,
    /// Посты выбранного пользователя.
    pub user_posts: Vec<Post>,
    /// Результаты текущего поиска.
    pub search_results: Vec<Post>,

    /// Курсор глобального списка.
    pub pagination: Pagination,
    /// Курсор списка пользователя.
    pub user_pagination: Pagination,
    /// Курсор результатов поиска.
    pub search_pagination: Pagination,

    /// Последняя загруженная статистика.
    pub stats: PostStats,
    /// Активная строка поиска.
    pub search_query: String,
    /// Пользователь, чьи посты загружены в `user_posts`.
    pub selected_user_id: Option<String>,

    /// Прогресс загрузки изображения, 0..=100.
    pub upload_progress: u8,
    /// Результат последней успешной загрузки изображения.
    pub uploaded_image: Option<ImageUpload>,

    loading: [bool; OpKind::COUNT],
    errors: [Option<String>; OpKind::COUNT],
}

impl PostsState {
    /// Идёт ли операция данной категории.
    pub fn loading(&self, kind: OpKind) -> bool {
        self.loading[kind.index()]
    }

    /// Последняя ошибка данной категории.
    pub fn error(&self, kind: OpKind) -> Option<&str> {
        self.errors[kind.index()].as_deref()
    }

    /// Идёт ли хотя бы одна операция.
    pub fn is_any_loading(&self) -> bool {
        self.loading.iter().any(|flag| *flag)
    }

    /// Есть ли незакрытая ошибка хотя бы одной категории.
    pub fn has_any_error(&self) -> bool {
        self.errors.iter().any(Option::is_some)
    }

    /// Ищет пост по id: сначала глобальный список, затем посты
    /// пользователя, затем результаты поиска.
    pub fn find_post(&self, id: &str) -> Option<&Post> {
        self.posts
            .iter()
            .chain(self.user_posts.iter())
            .chain(self.search_results.iter())
            .find(|post| post.id == id)
    }

    /// Курсор представления.
    pub fn view_pagination(&self, view: ViewKind) -> Pagination {
        match view {
            ViewKind::Primary => self.pagination,
            ViewKind::ByUser => self.user_pagination,
            ViewKind::Search => self.search_pagination,
        }
    }

    // --- переходы статуса операции ---

    pub(crate) fn begin(&mut self, kind: OpKind) {
        self.loading[kind.index()] = true;
        self.errors[kind.index()] = None;
        if kind == OpKind::UploadImage {
            self.upload_progress = 0;
        }
    }

    pub(crate) fn finish(&mut self, kind: OpKind) {
        self.loading[kind.index()] = false;
    }

    pub(crate) fn fail(&mut self, kind: OpKind, message: String) {
        self.loading[kind.index()] = false;
        self.errors[kind.index()] = Some(message);
        if kind == OpKind::UploadImage {
            self.upload_progress = 0;
        }
    }

    // --- правила сверки ---

    /// Новый пост попадает в начало глобального списка. Представления
    /// `user_posts`/`search_results` не трогаем: они обновляются своими
    /// выборками.
    pub(crate) fn apply_created(&mut self, post: Post) {
        debug!(post_id = %post.id, "post created, prepending to primary view");
        self.posts.insert(0, post);
        self.pagination.add_one();
    }

    /// Страница глобального списка: продолжение текущего курсора
    /// дописывается в конец, любая другая страница замещает список.
    pub(crate) fn apply_primary_page(&mut self, posts: Vec<Post>, cursor: Pagination) {
        let continues = continues_cursor(&self.pagination, &cursor) && !self.posts.is_empty();
        if continues {
            append_missing(&mut self.posts, posts);
        } else {
            self.posts = posts;
        }
        self.pagination = cursor;
    }

    /// Страница постов пользователя; смена пользователя замещает список.
    pub(crate) fn apply_user_page(&mut self, user_id: String, posts: Vec<Post>, cursor: Pagination) {
        let same_user = self.selected_user_id.as_deref() == Some(user_id.as_str());
        let continues =
            same_user && continues_cursor(&self.user_pagination, &cursor) && !self.user_posts.is_empty();
        if continues {
            append_missing(&mut self.user_posts, posts);
        } else {
            self.user_posts = posts;
        }
        self.user_pagination = cursor;
        self.selected_user_id = Some(user_id);
    }

    /// Страница результатов поиска; смена запроса замещает список.
    pub(crate) fn apply_search_page(&mut self, query: String, posts: Vec<Post>, cursor: Pagination) {
        let same_query = self.search_query == query;
        let continues = same_query
            && continues_cursor(&self.search_pagination, &cursor)
            && !self.search_results.is_empty();
        if continues {
            append_missing(&mut self.search_results, posts);
        } else {
            self.search_results = posts;
        }
        self.search_pagination = cursor;
        self.search_query = query;
    }

    pub(crate) fn apply_current(&mut self, post: Post) {
        self.current_post = Some(post);
    }

    /// Обновлённый пост замещается на месте в каждом представлении, где он
    /// есть; в представления, где его не было, он не добавляется.
    pub(crate) fn apply_updated(&mut self, post: Post) {
        debug!(post_id = %post.id, "post updated, reconciling views");
        replace_in_place(&mut self.posts, &post);
        replace_in_place(&mut self.user_posts, &post);
        replace_in_place(&mut self.search_results, &post);
        if self
            .current_post
            .as_ref()
            .is_some_and(|current| current.id == post.id)
        {
            self.current_post = Some(post);
        }
    }

    /// Удалённый пост исчезает из всех представлений за один шаг сверки;
    /// курсор каждого затронутого представления теряет один элемент.
    pub(crate) fn apply_deleted(&mut self, id: &str) {
        debug!(post_id = %id, "post deleted, removing from all views");
        if remove_by_id(&mut self.posts, id) {
            self.pagination.drop_one();
        }
        if remove_by_id(&mut self.user_posts, id) {
            self.user_pagination.drop_one();
        }
        if remove_by_id(&mut self.search_results, id) {
            self.search_pagination.drop_one();
        }
        if self
            .current_post
            .as_ref()
            .is_some_and(|current| current.id == id)
        {
            self.current_post = None;
        }
    }

    /// Успешная загрузка: прогресс 100, результат сохранён. Посты не
    /// мутируются — URL попадёт в пост через последующий create/update.
    pub(crate) fn apply_uploaded(&mut self, upload: ImageUpload) {
        self.upload_progress = 100;
        self.uploaded_image = Some(upload);
    }

    pub(crate) fn apply_image_deleted(&mut self) {
        self.uploaded_image = None;
    }

    pub(crate) fn apply_stats(&mut self, stats: PostStats) {
        self.stats = stats;
    }

    // --- явные действия ---

    /// Сбрасывает ошибку одной категории или все сразу.
    pub(crate) fn clear_error(&mut self, kind: Option<OpKind>) {
        match kind {
            Some(kind) => self.errors[kind.index()] = None,
            None => self.errors = Default::default(),
        }
    }

    pub(crate) fn clear_current_post(&mut self) {
        self.current_post = None;
        self.errors[OpKind::GetById.index()] = None;
    }

    pub(crate) fn clear_search_results(&mut self) {
        self.search_results = Vec::new();
        self.search_query = String::new();
        self.search_pagination = Pagination::default();
        self.errors[OpKind::Search.index()] = None;
    }

    pub(crate) fn clear_user_posts(&mut self) {
        self.user_posts = Vec::new();
        self.selected_user_id = None;
        self.user_pagination = Pagination::default();
        self.errors[OpKind::ListByUser.index()] = None;
    }

    pub(crate) fn set_search_query(&mut self, query: String) {
        self.search_query = query;
    }

    pub(crate) fn set_selected_user_id(&mut self, user_id: Option<String>) {
        self.selected_user_id = user_id;
    }

    pub(crate) fn reset_upload_state(&mut self) {
        self.upload_progress = 0;
        self.uploaded_image = None;
        self.errors[OpKind::UploadImage.index()] = None;
        self.errors[OpKind::DeleteImage.index()] = None;
    }

    pub(crate) fn update_upload_progress(&mut self, progress: u8) {
        self.upload_progress = progress.min(100);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Продолжает ли пришедший курсор текущий (следующая страница той же
/// выборки).
fn continues_cursor(current: &Pagination, incoming: &Pagination) -> bool {
    incoming.page == current.page + 1 && incoming.limit == current.limit
}

/// Дописывает посты, пропуская id, уже присутствующие в представлении
/// (страницы могли сместиться после create).
fn append_missing(view: &mut Vec<Post>, incoming: Vec<Post>) {
    for post in incoming {
        if !view.iter().any(|existing| existing.id == post.id) {
            view.push(post);
        }
    }
}

fn replace_in_place(view: &mut [Post], post: &Post) {
    if let Some(slot) = view.iter_mut().find(|existing| existing.id == post.id) {
        *slot = post.clone();
    }
}

fn remove_by_id(view: &mut Vec<Post>, id: &str) -> bool {
    let before = view.len();
    view.retain(|post| post.id != id);
    view.len() != before
}
