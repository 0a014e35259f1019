use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Максимальная длина заголовка поста.
const MAX_TITLE_LEN: usize = 255;
/// Максимальный размер страницы выборки.
const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Статус публикации поста.
pub enum PostStatus {
    /// Черновик, не виден читателям.
    Draft,
    /// Опубликованный пост.
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Публичная модель поста.
pub struct Post {
    /// Идентификатор поста (назначается бэкендом).
    pub id: String,
    /// Заголовок поста.
    pub title: String,
    /// Содержимое поста.
    pub content: String,
    /// URL обложки, если загружена.
    pub featured_image: Option<String>,
    /// Идентификатор автора.
    pub author_id: String,
    /// Статус публикации.
    pub status: PostStatus,
    /// Дата и время создания (UTC).
    pub created_at: DateTime<Utc>,
    /// Дата и время последнего обновления (UTC).
    pub updated_at: DateTime<Utc>,
    /// Дата и время публикации: `Some` только для `Published`.
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Проверяет согласованность поста: непустой id и автор, связка
    /// `status`/`published_at`.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.id.trim().is_empty() {
            return Err(GatewayError::Validation {
                field: "id",
                message: "must not be empty",
            });
        }
        if self.author_id.trim().is_empty() {
            return Err(GatewayError::Validation {
                field: "author_id",
                message: "must not be empty",
            });
        }
        match (self.status, self.published_at) {
            (PostStatus::Published, None) => Err(GatewayError::Validation {
                field: "published_at",
                message: "required for published posts",
            }),
            (PostStatus::Draft, Some(_)) => Err(GatewayError::Validation {
                field: "published_at",
                message: "must be empty for drafts",
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Страница постов, возвращаемая операциями выборки.
pub struct PostPage {
    /// Посты текущей страницы.
    pub posts: Vec<Post>,
    /// Общее количество постов в выборке.
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Результат загрузки изображения в хранилище.
pub struct ImageUpload {
    /// Публичный URL изображения.
    pub url: String,
    /// Путь в хранилище (используется для удаления).
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Агрегированная статистика постов.
pub struct PostStats {
    /// Всего постов.
    pub total_posts: u64,
    /// Из них опубликовано.
    pub published_posts: u64,
    /// Из них черновиков.
    pub draft_posts: u64,
    /// Пользователь, по которому построена статистика (`None` — глобальная).
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
/// Файл изображения для загрузки.
pub struct ImageFile {
    /// Имя файла с расширением.
    pub file_name: String,
    /// MIME-тип, например `image/png`.
    pub content_type: String,
    /// Содержимое файла.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Данные нового поста.
pub struct NewPost {
    /// Заголовок.
    pub title: String,
    /// Содержимое.
    pub content: String,
    /// URL обложки, если уже загружена.
    pub featured_image: Option<String>,
    /// Идентификатор автора.
    pub author_id: String,
    /// Статус публикации.
    pub status: PostStatus,
}

impl NewPost {
    /// Нормализует поля и проверяет обязательные значения.
    pub fn validate(self) -> GatewayResult<Self> {
        if self.author_id.trim().is_empty() {
            return Err(GatewayError::Validation {
                field: "author_id",
                message: "must not be empty",
            });
        }
        Ok(Self {
            title: normalize_title(&self.title)?,
            content: normalize_content(&self.content)?,
            author_id: self.author_id.trim().to_string(),
            ..self
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// Частичное обновление поста: `None` — поле не меняется.
pub struct PostPatch {
    /// Новый заголовок.
    pub title: Option<String>,
    /// Новое содержимое.
    pub content: Option<String>,
    /// Новый URL обложки.
    pub featured_image: Option<String>,
    /// Новый статус публикации.
    pub status: Option<PostStatus>,
}

impl PostPatch {
    /// Нормализует заданные поля; хотя бы одно поле должно быть задано.
    pub fn validate(self) -> GatewayResult<Self> {
        if self.title.is_none()
            && self.content.is_none()
            && self.featured_image.is_none()
            && self.status.is_none()
        {
            return Err(GatewayError::Validation {
                field: "patch",
                message: "at least one field must be set",
            });
        }
        Ok(Self {
            title: self.title.as_deref().map(normalize_title).transpose()?,
            content: self.content.as_deref().map(normalize_content).transpose()?,
            ..self
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Ключ сортировки списка постов.
pub enum SortKey {
    /// По дате создания.
    CreatedAt,
    /// По дате последнего обновления.
    UpdatedAt,
    /// По заголовку.
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Направление сортировки.
pub enum SortOrder {
    /// По возрастанию.
    Asc,
    /// По убыванию.
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Параметры выборки глобального списка постов.
pub struct ListParams {
    /// Номер страницы, начиная с 1.
    pub page: u32,
    /// Размер страницы.
    pub limit: u32,
    /// Ключ сортировки.
    pub sort_by: SortKey,
    /// Направление сортировки.
    pub sort_order: SortOrder,
    /// Фильтр по статусу: `None` — без фильтра.
    pub status: Option<PostStatus>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort_by: SortKey::CreatedAt,
            sort_order: SortOrder::Desc,
            status: None,
        }
    }
}

impl ListParams {
    /// Проверяет границы страницы и размера выборки.
    pub fn validate(self) -> GatewayResult<Self> {
        validate_page_window(self.page, self.limit)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Параметры страницы для выборок по пользователю и поиска.
pub struct PageParams {
    /// Номер страницы, начиная с 1.
    pub page: u32,
    /// Размер страницы.
    pub limit: u32,
    /// Фильтр по статусу: `None` — без фильтра.
    pub status: Option<PostStatus>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            status: None,
        }
    }
}

impl PageParams {
    /// Проверяет границы страницы и размера выборки.
    pub fn validate(self) -> GatewayResult<Self> {
        validate_page_window(self.page, self.limit)?;
        Ok(self)
    }
}

fn validate_page_window(page: u32, limit: u32) -> GatewayResult<()> {
    if page == 0 {
        return Err(GatewayError::Validation {
            field: "page",
            message: "must be >= 1",
        });
    }
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(GatewayError::Validation {
            field: "limit",
            message: "must be 1..=100",
        });
    }
    Ok(())
}

fn normalize_title(title: &str) -> GatewayResult<String> {
    let title = title.trim();
    if title.is_empty() || title.len() > MAX_TITLE_LEN {
        return Err(GatewayError::Validation {
            field: "title",
            message: "must be 1..255 chars",
        });
    }
    Ok(title.to_string())
}

fn normalize_content(content: &str) -> GatewayResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(GatewayError::Validation {
            field: "content",
            message: "must not be empty",
        });
    }
    Ok(content.to_string())
}
