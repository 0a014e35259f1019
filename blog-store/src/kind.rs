use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Категория асинхронной операции.
///
/// Флаги загрузки, последняя ошибка и токен вытеснения отслеживаются
/// независимо для каждой категории.
pub enum OpKind {
    /// Создание поста.
    Create,
    /// Глобальный список постов.
    List,
    /// Список постов одного пользователя.
    ListByUser,
    /// Получение поста по идентификатору.
    GetById,
    /// Обновление поста.
    Update,
    /// Удаление поста.
    Delete,
    /// Поиск постов.
    Search,
    /// Загрузка изображения.
    UploadImage,
    /// Удаление изображения.
    DeleteImage,
    /// Статистика постов.
    GetStats,
}

impl OpKind {
    /// Количество категорий операций.
    pub const COUNT: usize = 10;

    /// Все категории в порядке объявления.
    pub const ALL: [OpKind; Self::COUNT] = [
        OpKind::Create,
        OpKind::List,
        OpKind::ListByUser,
        OpKind::GetById,
        OpKind::Update,
        OpKind::Delete,
        OpKind::Search,
        OpKind::UploadImage,
        OpKind::DeleteImage,
        OpKind::GetStats,
    ];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Строковое имя категории (для логов).
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::List => "list",
            OpKind::ListByUser => "list_by_user",
            OpKind::GetById => "get_by_id",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
            OpKind::Search => "search",
            OpKind::UploadImage => "upload_image",
            OpKind::DeleteImage => "delete_image",
            OpKind::GetStats => "get_stats",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
