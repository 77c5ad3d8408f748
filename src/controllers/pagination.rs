/// Window `[(page - 1) * limit, min(page * limit, len))` of `items`.
///
/// Pages are 1-based. Page 0, a zero limit or a page past the end all
/// yield an empty slice.
pub fn paginate<T>(items: &[T], page: u32, limit: u32) -> &[T] {
    if page == 0 || limit == 0 {
        return &[];
    }
    let limit = limit as usize;
    let start = (page as usize - 1).saturating_mul(limit);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(limit).min(items.len());
    &items[start..end]
}
