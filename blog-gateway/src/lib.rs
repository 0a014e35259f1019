//! Шлюз удалённых данных блог-платформы.
//!
//! Определяет контракт `PostGateway` — десять операций CRUD/поиска/загрузки,
//! которые бэкенд предоставляет клиенту, — и его HTTP-реализацию
//! (`HttpGateway`, `reqwest`).
//!
//! Каждая операция возвращает `GatewayResult<T>`; слой синхронизации
//! (`blog-store`) превращает эти результаты в согласованное состояние
//! представлений.
#![warn(missing_docs)]

mod error;
mod http;
mod models;

pub use error::{GatewayError, GatewayResult};
pub use http::HttpGateway;
pub use models::{
    ImageFile, ImageUpload, ListParams, NewPost, PageParams, Post, PostPage, PostPatch, PostStats,
    PostStatus, SortKey, SortOrder,
};

use async_trait::async_trait;

#[async_trait]
/// Контракт шлюза удалённых данных для постов.
///
/// Все методы выполняют ровно один вызов бэкенда и не имеют побочных
/// эффектов на стороне клиента.
pub trait PostGateway: Send + Sync + 'static {
    /// Создаёт пост и возвращает его серверное представление.
    async fn create_post(&self, input: NewPost) -> GatewayResult<Post>;

    /// Возвращает страницу глобального списка постов.
    async fn list_posts(&self, params: &ListParams) -> GatewayResult<PostPage>;

    /// Возвращает страницу постов одного пользователя.
    async fn list_posts_by_user(
        &self,
        user_id: &str,
        params: &PageParams,
    ) -> GatewayResult<PostPage>;

    /// Возвращает пост по идентификатору.
    async fn get_post(&self, id: &str) -> GatewayResult<Post>;

    /// Применяет частичное обновление и возвращает обновлённый пост.
    async fn update_post(&self, id: &str, patch: &PostPatch) -> GatewayResult<Post>;

    /// Удаляет пост по идентификатору.
    async fn delete_post(&self, id: &str) -> GatewayResult<()>;

    /// Возвращает страницу постов, найденных по строке запроса.
    async fn search_posts(&self, query: &str, params: &PageParams) -> GatewayResult<PostPage>;

    /// Загружает изображение и возвращает его URL и путь в хранилище.
    async fn upload_image(
        &self,
        file: ImageFile,
        post_id: Option<&str>,
    ) -> GatewayResult<ImageUpload>;

    /// Удаляет изображение по пути в хранилище.
    async fn delete_image(&self, path: &str) -> GatewayResult<()>;

    /// Возвращает агрегированную статистику постов, опционально по автору.
    async fn post_stats(&self, user_id: Option<&str>) -> GatewayResult<PostStats>;
}
