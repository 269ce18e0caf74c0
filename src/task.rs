use super::result::PoolResult;


/// Единица работы (interactor), которую пул выполняет ровно один раз
pub trait Task: Send + 'static {
    fn execute(self: Box<Self>);
}

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    #[inline]
    fn execute(self: Box<Self>) {
        (*self)()
    }
}

pub type BoxedTask = Box<dyn Task>;


/// Фасад отправки задач: проверяет аргумент синхронно и отдаёт задачу исполнителю.
///
/// `None` отклоняется с `PoolError::InvalidArgument` до постановки в очередь.
pub trait Executor {
    fn run(&self, interactor: Option<BoxedTask>) -> PoolResult<()>;
}
