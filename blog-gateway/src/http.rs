use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::PostGateway;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{
    ImageFile, ImageUpload, ListParams, NewPost, PageParams, Post, PostPage, PostPatch, PostStats,
    PostStatus, SortKey, SortOrder,
};

#[derive(Debug, Serialize)]
struct CreatePostRequestDto<'a> {
    title: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_image: Option<&'a str>,
    author_id: &'a str,
    status: PostStatus,
}

#[derive(Debug, Serialize)]
struct UpdatePostRequestDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<PostStatus>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostDto {
    id: String,
    title: String,
    content: String,
    featured_image: Option<String>,
    author_id: String,
    status: PostStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PostPageDto {
    posts: Vec<PostDto>,
    total: i64,
}

#[derive(Debug, Deserialize)]
struct ImageUploadDto {
    url: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct PostStatsDto {
    total_posts: u64,
    published_posts: u64,
    draft_posts: u64,
}

#[derive(Serialize)]
struct ListPostsQuery {
    page: u32,
    limit: u32,
    sort_by: SortKey,
    sort_order: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<PostStatus>,
}

#[derive(Serialize)]
struct PageQuery {
    page: u32,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<PostStatus>,
}

#[derive(Serialize)]
struct SearchQuery<'a> {
    q: &'a str,
    page: u32,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<PostStatus>,
}

impl From<PostDto> for Post {
    fn from(value: PostDto) -> Self {
        Self {
            id: value.id,
            title: value.title,
            content: value.content,
            featured_image: value.featured_image,
            author_id: value.author_id,
            status: value.status,
            created_at: value.created_at,
            updated_at: value.updated_at,
            published_at: value.published_at,
        }
    }
}

/// Декодирует пост из ответа бэкенда, отклоняя несогласованные данные
/// (например, опубликованный пост без `published_at`).
fn decode_post(dto: PostDto) -> GatewayResult<Post> {
    let post = Post::from(dto);
    post.validate()?;
    Ok(post)
}

fn decode_page(dto: PostPageDto) -> GatewayResult<PostPage> {
    let posts = dto
        .posts
        .into_iter()
        .map(decode_post)
        .collect::<GatewayResult<Vec<_>>>()?;
    Ok(PostPage {
        posts,
        total: dto.total.max(0) as u64,
    })
}

impl From<ImageUploadDto> for ImageUpload {
    fn from(value: ImageUploadDto) -> Self {
        Self {
            url: value.url,
            path: value.path,
        }
    }
}

#[derive(Debug, Clone)]
/// HTTP-реализация шлюза поверх REST API бэкенда.
pub struct HttpGateway {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl HttpGateway {
    /// Создаёт шлюз с базовым URL бэкенда.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build reqwest client");

        Self {
            base_url: base_url.into(),
            client,
            token: None,
        }
    }

    /// Возвращает шлюз с bearer-токеном для защищённых операций.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, self.endpoint(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn decode_error(response: reqwest::Response) -> GatewayError {
        let status = response.status();

        let message = match response.json::<ErrorResponseDto>().await {
            Ok(body) => body
                .error
                .unwrap_or_else(|| format!("http status {status}")),
            Err(_) => format!("http status {status}"),
        };
        GatewayError::from_http_status(status, Some(message))
    }

    /// Универсальный helper: отправляет запрос и декодирует JSON-ответ.
    async fn execute<TRes>(request: reqwest::RequestBuilder) -> GatewayResult<TRes>
    where
        TRes: DeserializeOwned,
    {
        let response = request.send().await.map_err(GatewayError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        response
            .json::<TRes>()
            .await
            .map_err(GatewayError::from_reqwest)
    }

    /// Вариант для операций без тела ответа.
    async fn execute_empty(request: reqwest::RequestBuilder) -> GatewayResult<()> {
        let response = request.send().await.map_err(GatewayError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl PostGateway for HttpGateway {
    async fn create_post(&self, input: NewPost) -> GatewayResult<Post> {
        let payload = CreatePostRequestDto {
            title: &input.title,
            content: &input.content,
            featured_image: input.featured_image.as_deref(),
            author_id: &input.author_id,
            status: input.status,
        };
        let dto: PostDto =
            Self::execute(self.request(Method::POST, "/api/posts").json(&payload)).await?;
        decode_post(dto)
    }

    async fn list_posts(&self, params: &ListParams) -> GatewayResult<PostPage> {
        let query = ListPostsQuery {
            page: params.page,
            limit: params.limit,
            sort_by: params.sort_by,
            sort_order: params.sort_order,
            status: params.status,
        };
        let dto: PostPageDto =
            Self::execute(self.request(Method::GET, "/api/posts").query(&query)).await?;
        decode_page(dto)
    }

    async fn list_posts_by_user(
        &self,
        user_id: &str,
        params: &PageParams,
    ) -> GatewayResult<PostPage> {
        let query = PageQuery {
            page: params.page,
            limit: params.limit,
            status: params.status,
        };
        let dto: PostPageDto = Self::execute(
            self.request(Method::GET, &format!("/api/users/{user_id}/posts"))
                .query(&query),
        )
        .await?;
        decode_page(dto)
    }

    async fn get_post(&self, id: &str) -> GatewayResult<Post> {
        let dto: PostDto =
            Self::execute(self.request(Method::GET, &format!("/api/posts/{id}"))).await?;
        decode_post(dto)
    }

    async fn update_post(&self, id: &str, patch: &PostPatch) -> GatewayResult<Post> {
        let payload = UpdatePostRequestDto {
            title: patch.title.as_deref(),
            content: patch.content.as_deref(),
            featured_image: patch.featured_image.as_deref(),
            status: patch.status,
        };
        let dto: PostDto = Self::execute(
            self.request(Method::PATCH, &format!("/api/posts/{id}"))
                .json(&payload),
        )
        .await?;
        decode_post(dto)
    }

    async fn delete_post(&self, id: &str) -> GatewayResult<()> {
        Self::execute_empty(self.request(Method::DELETE, &format!("/api/posts/{id}"))).await
    }

    async fn search_posts(&self, query: &str, params: &PageParams) -> GatewayResult<PostPage> {
        let query = SearchQuery {
            q: query,
            page: params.page,
            limit: params.limit,
            status: params.status,
        };
        let dto: PostPageDto =
            Self::execute(self.request(Method::GET, "/api/posts/search").query(&query)).await?;
        decode_page(dto)
    }

    async fn upload_image(
        &self,
        file: ImageFile,
        post_id: Option<&str>,
    ) -> GatewayResult<ImageUpload> {
        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(GatewayError::from_reqwest)?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(post_id) = post_id {
            form = form.text("post_id", post_id.to_string());
        }

        let dto: ImageUploadDto =
            Self::execute(self.request(Method::POST, "/api/images").multipart(form)).await?;
        Ok(dto.into())
    }

    async fn delete_image(&self, path: &str) -> GatewayResult<()> {
        Self::execute_empty(
            self.request(Method::DELETE, "/api/images")
                .query(&[("path", path)]),
        )
        .await
    }

    async fn post_stats(&self, user_id: Option<&str>) -> GatewayResult<PostStats> {
        let mut request = self.request(Method::GET, "/api/posts/stats");
        if let Some(user_id) = user_id {
            request = request.query(&[("user_id", user_id)]);
        }

        let dto: PostStatsDto = Self::execute(request).await?;
        Ok(PostStats {
            total_posts: dto.total_posts,
            published_posts: dto.published_posts,
            draft_posts: dto.draft_posts,
            user_id: user_id.map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn endpoint_normalizes_slashes() {
        let gateway = HttpGateway::new("http://localhost:8080/");
        let full = gateway.endpoint("/api/posts");
        assert_eq!(full, "http://localhost:8080/api/posts");
    }

    fn post_dto(id: &str, status: PostStatus) -> PostDto {
        PostDto {
            id: id.to_string(),
            title: "t".to_string(),
            content: "c".to_string(),
            featured_image: None,
            author_id: "u1".to_string(),
            status,
            created_at: Utc.timestamp_opt(10, 0).single().expect("valid ts"),
            updated_at: Utc.timestamp_opt(20, 0).single().expect("valid ts"),
            published_at: None,
        }
    }

    #[test]
    fn decode_page_clamps_negative_total() {
        let dto = PostPageDto {
            posts: vec![post_dto("p1", PostStatus::Draft)],
            total: -7,
        };

        let page = decode_page(dto).expect("page must decode");
        assert_eq!(page.total, 0);
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].id, "p1");
    }

    #[test]
    fn decode_post_rejects_published_without_timestamp() {
        let dto = post_dto("p1", PostStatus::Published);

        let err = decode_post(dto).expect_err("inconsistent post must be rejected");
        assert!(matches!(
            err,
            GatewayError::Validation {
                field: "published_at",
                ..
            }
        ));
    }

    #[test]
    fn decode_page_rejects_page_with_inconsistent_post() {
        let dto = PostPageDto {
            posts: vec![
                post_dto("p1", PostStatus::Draft),
                post_dto("p2", PostStatus::Published),
            ],
            total: 2,
        };

        assert!(decode_page(dto).is_err());
    }

    #[test]
    fn list_query_serializes_status_filter_lowercase() {
        let query = ListPostsQuery {
            page: 2,
            limit: 10,
            sort_by: SortKey::CreatedAt,
            sort_order: SortOrder::Desc,
            status: Some(PostStatus::Published),
        };

        let encoded = serde_urlencoded::to_string(&query).expect("must encode");
        assert_eq!(
            encoded,
            "page=2&limit=10&sort_by=created_at&sort_order=desc&status=published"
        );
    }

    #[test]
    fn list_query_omits_missing_status_filter() {
        let query = PageQuery {
            page: 1,
            limit: 10,
            status: None,
        };

        let encoded = serde_urlencoded::to_string(&query).expect("must encode");
        assert_eq!(encoded, "page=1&limit=10");
    }
}
