mod category_list;
mod product_detail;
mod product_edit;
mod product_list;

pub use category_list::CategoryListView;
pub use product_detail::ProductDetailView;
pub use product_edit::ProductEditView;
pub use product_list::ProductListView;
