use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Курсор пагинации одного спискового представления.
pub struct Pagination {
    /// Текущая страница, начиная с 1.
    pub page: u32,
    /// Размер страницы.
    pub limit: u32,
    /// Общее количество элементов в выборке.
    pub total: u64,
    /// Количество страниц: `ceil(total / limit)`.
    pub total_pages: u32,
}

impl Pagination {
    /// Строит курсор из запрошенной страницы и общего количества.
    ///
    /// `page` и `limit` меньше 1 приводятся к 1, чтобы арифметика страниц
    /// оставалась корректной при любом входе.
    pub fn of(page: u32, limit: u32, total: u64) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            total_pages: total_pages(total, limit),
        }
    }

    /// Есть ли ещё страницы после текущей.
    pub fn can_load_more(&self) -> bool {
        self.page < self.total_pages
    }

    /// Номер следующей страницы.
    pub fn next_page(&self) -> u32 {
        self.page + 1
    }

    /// Учитывает появление одного элемента в выборке.
    pub(crate) fn add_one(&mut self) {
        self.total += 1;
        self.total_pages = total_pages(self.total, self.limit);
    }

    /// Учитывает исчезновение одного элемента, не опускаясь ниже нуля.
    pub(crate) fn drop_one(&mut self) {
        self.total = self.total.saturating_sub(1);
        self.total_pages = total_pages(self.total, self.limit);
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::of(1, 10, 0)
    }
}

fn total_pages(total: u64, limit: u32) -> u32 {
    total.div_ceil(u64::from(limit.max(1))) as u32
}
