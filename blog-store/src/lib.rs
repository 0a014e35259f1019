//! Клиентский слой синхронизации сущностей блог-платформы.
//!
//! Держит четыре представления одних и тех же постов (глобальный список,
//! посты пользователя, результаты поиска, выбранный пост) взаимно
//! согласованными по мере асинхронного завершения операций
//! create/update/delete/upload, отслеживая статус загрузки и последнюю
//! ошибку независимо по каждой категории операций.
//!
//! Гарантии:
//! - после успешной мутации ни одно представление не показывает устаревшие
//!   поля поста, присутствующего в другом представлении;
//! - результат вытесненного вызова (той же категории, отправленного раньше,
//!   завершившегося позже) никогда не применяется к состоянию;
//! - ошибка одной категории не затрагивает статусы остальных и гаснет сама
//!   через заданное время, если её не закрыли явно.
#![warn(missing_docs)]

mod kind;
mod pagination;
mod state;
mod store;

pub use kind::OpKind;
pub use pagination::Pagination;
pub use state::{PostsState, ViewKind};
pub use store::{DEFAULT_ERROR_TTL, DispatchResult, PostStore};
