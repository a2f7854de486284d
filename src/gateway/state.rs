use crate::cache::ResultStore;
use crate::embedding::RelevanceScorer;
use crate::generate::AnswerGenerator;
use crate::pipeline::RetrievalPipeline;
use crate::vectordb::VectorIndex;

pub struct HandlerState<I, R, C> {
    pub pipeline: RetrievalPipeline<I, R, C>,

    pub generator: AnswerGenerator,
}

impl<I, R, C> Clone for HandlerState<I, R, C> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            generator: self.generator.clone(),
        }
    }
}

impl<I, R, C> HandlerState<I, R, C>
where
    I: VectorIndex + 'static,
    R: RelevanceScorer + 'static,
    C: ResultStore,
{
    pub fn new(pipeline: RetrievalPipeline<I, R, C>, generator: AnswerGenerator) -> Self {
        Self {
            pipeline,
            generator,
        }
    }
}
