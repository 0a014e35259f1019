use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, anyhow};
use blog_gateway::{
    HttpGateway, ImageFile, ListParams, NewPost, PageParams, Post, PostPatch, PostStatus, SortKey,
    SortOrder,
};
use blog_store::{Pagination, PostStore, ViewKind};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

const TOKEN_FILE: &str = ".blog_token";
const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Debug, Parser)]
#[command(name = "blog-cli", version, about = "CLI клиент блог-платформы")]
struct Cli {
    /// Адрес бэкенда (или переменная окружения BLOG_SERVER_URL).
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Создание поста (требует токен).
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        /// URL обложки (например, результат `upload`).
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        author: String,
        /// Статус: draft или published.
        #[arg(long, default_value = "draft")]
        status: String,
    },
    /// Получение поста по id.
    Get {
        #[arg(long)]
        id: String,
    },
    /// Частичное обновление поста (требует токен).
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        image: Option<String>,
        /// Статус: draft или published.
        #[arg(long)]
        status: Option<String>,
    },
    /// Удаление поста (требует токен).
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Глобальный список постов.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// Фильтр по статусу: draft или published.
        #[arg(long)]
        status: Option<String>,
    },
    /// Посты одного пользователя.
    UserPosts {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Поиск постов.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Загрузка изображения обложки (требует токен).
    Upload {
        /// Путь к файлу изображения.
        #[arg(long)]
        file: PathBuf,
        /// Пост, к которому относится изображение.
        #[arg(long)]
        post: Option<String>,
    },
    /// Удаление изображения по пути в хранилище (требует токен).
    DeleteImage {
        #[arg(long)]
        path: String,
    },
    /// Статистика постов, опционально по автору.
    Stats {
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Ошибка: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging("info")?;

    let cli = Cli::parse();

    let server = resolve_server(cli.server);
    let mut gateway = HttpGateway::new(server);
    if let Some(token) = load_token().context("не удалось прочитать .blog_token")? {
        gateway = gateway.with_token(token);
    }
    let store = PostStore::new(gateway);

    match cli.command {
        Command::Create {
            title,
            content,
            image,
            author,
            status,
        } => {
            let input = NewPost {
                title,
                content,
                featured_image: image,
                author_id: author,
                status: parse_status(&status)?,
            }
            .validate()?;

            let post = store
                .create_post(input)
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            print_post("Пост создан", &post);
        }
        Command::Get { id } => {
            let post = store
                .get_post(&id)
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            print_post("Пост", &post);
        }
        Command::Update {
            id,
            title,
            content,
            image,
            status,
        } => {
            let patch = PostPatch {
                title,
                content,
                featured_image: image,
                status: status.as_deref().map(parse_status).transpose()?,
            }
            .validate()?;

            let post = store
                .update_post(&id, patch)
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            print_post("Пост обновлён", &post);
        }
        Command::Delete { id } => {
            store
                .delete_post(&id)
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            println!("Пост удалён: id={id}");
        }
        Command::List { page, limit, status } => {
            let params = ListParams {
                page,
                limit,
                sort_by: SortKey::CreatedAt,
                sort_order: SortOrder::Desc,
                status: status.as_deref().map(parse_status).transpose()?,
            }
            .validate()?;

            store
                .list_posts(params)
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            print_view("Посты", &store.posts(), store.pagination(ViewKind::Primary));
        }
        Command::UserPosts { user, page, limit } => {
            let params = PageParams {
                page,
                limit,
                status: None,
            }
            .validate()?;

            store
                .list_posts_by_user(user.clone(), params)
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            print_view(
                &format!("Посты пользователя {user}"),
                &store.user_posts(),
                store.pagination(ViewKind::ByUser),
            );
        }
        Command::Search { query, page, limit } => {
            let params = PageParams {
                page,
                limit,
                status: None,
            }
            .validate()?;

            store
                .search_posts(query.clone(), params)
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            print_view(
                &format!("Найдено по запросу «{query}»"),
                &store.search_results(),
                store.pagination(ViewKind::Search),
            );
        }
        Command::Upload { file, post } => {
            let image = read_image_file(&file)?;
            let upload = store
                .upload_image(image, post.as_deref())
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            println!("Изображение загружено");
            println!("url: {}", upload.url);
            println!("path: {}", upload.path);
        }
        Command::DeleteImage { path } => {
            store
                .delete_image(&path)
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            println!("Изображение удалено: {path}");
        }
        Command::Stats { user } => {
            let stats = store
                .get_stats(user.as_deref())
                .await
                .into_result()
                .map_err(anyhow::Error::msg)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("не удалось сериализовать статистику")?
            );
        }
    }

    Ok(())
}

fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(())
}

fn resolve_server(flag: Option<String>) -> String {
    let raw = flag
        .or_else(|| std::env::var("BLOG_SERVER_URL").ok())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    normalize_server(raw)
}

fn normalize_server(server: String) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        return server;
    }

    format!("http://{server}")
}

fn parse_status(raw: &str) -> Result<PostStatus> {
    match raw.trim().to_lowercase().as_str() {
        "draft" => Ok(PostStatus::Draft),
        "published" => Ok(PostStatus::Published),
        other => Err(anyhow!("неизвестный статус «{other}», ожидается draft или published")),
    }
}

fn read_image_file(path: &Path) -> Result<ImageFile> {
    let bytes =
        fs::read(path).with_context(|| format!("не удалось прочитать файл {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("некорректное имя файла"))?
        .to_string();
    let content_type = guess_content_type(&file_name)?.to_string();

    Ok(ImageFile {
        file_name,
        content_type,
        bytes,
    })
}

fn guess_content_type(file_name: &str) -> Result<&'static str> {
    let extension = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => Err(anyhow!(
            "неподдерживаемый формат изображения: ожидается jpeg, png, gif или webp"
        )),
    }
}

fn parse_token_content(raw: &str) -> Option<String> {
    let token = raw.trim().to_string();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn load_token() -> io::Result<Option<String>> {
    if !Path::new(TOKEN_FILE).exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(TOKEN_FILE)?;
    Ok(parse_token_content(&raw))
}

fn print_post(title: &str, post: &Post) {
    println!("{title}");
    println!("id: {}", post.id);
    println!("title: {}", post.title);
    println!("content: {}", post.content);
    if let Some(image) = &post.featured_image {
        println!("featured_image: {image}");
    }
    println!("author_id: {}", post.author_id);
    println!(
        "status: {}",
        match post.status {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    );
    if let Some(published_at) = post.published_at {
        println!("published_at: {published_at}");
    }
    println!("created_at: {}", post.created_at);
    println!("updated_at: {}", post.updated_at);
}

fn format_view_header(title: &str, shown: usize, cursor: Pagination) -> String {
    format!(
        "{title}: {shown} (страница {}/{}, всего {})",
        cursor.page, cursor.total_pages, cursor.total
    )
}

fn print_view(title: &str, posts: &[Post], cursor: Pagination) {
    println!("{}", format_view_header(title, posts.len(), cursor));

    for post in posts {
        println!("- [{}] {} (author_id={})", post.id, post.title, post.author_id);
    }

    if cursor.can_load_more() {
        println!("... ещё есть страницы: --page {}", cursor.next_page());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_server_keeps_scheme() {
        let s = normalize_server("https://example.com:8080".to_string());
        assert_eq!(s, "https://example.com:8080");
    }

    #[test]
    fn normalize_server_adds_http_scheme() {
        let s = normalize_server("127.0.0.1:9000".to_string());
        assert_eq!(s, "http://127.0.0.1:9000");
    }

    #[test]
    fn parse_status_accepts_known_values() {
        assert!(matches!(parse_status("draft"), Ok(PostStatus::Draft)));
        assert!(matches!(
            parse_status(" Published "),
            Ok(PostStatus::Published)
        ));
    }

    #[test]
    fn parse_status_rejects_unknown_value() {
        assert!(parse_status("archived").is_err());
    }

    #[test]
    fn guess_content_type_maps_known_extensions() {
        assert_eq!(
            guess_content_type("photo.JPG").expect("jpg must map"),
            "image/jpeg"
        );
        assert_eq!(
            guess_content_type("cover.png").expect("png must map"),
            "image/png"
        );
    }

    #[test]
    fn guess_content_type_rejects_unknown_extension() {
        assert!(guess_content_type("notes.txt").is_err());
    }

    #[test]
    fn parse_token_content_trims_whitespace() {
        let token = parse_token_content("  abc.def.ghi  ");
        assert_eq!(token.as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn parse_token_content_rejects_blank() {
        let token = parse_token_content("   ");
        assert!(token.is_none());
    }

    #[test]
    fn format_view_header_shows_zero_pages_for_empty_view() {
        let header = format_view_header("Посты", 0, Pagination::of(1, 10, 0));
        assert_eq!(header, "Посты: 0 (страница 1/0, всего 0)");
    }

    #[test]
    fn format_view_header_shows_cursor_as_is() {
        let header = format_view_header("Посты", 10, Pagination::of(2, 10, 25));
        assert_eq!(header, "Посты: 10 (страница 2/3, всего 25)");
    }
}
