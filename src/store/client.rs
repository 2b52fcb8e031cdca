//! Adapter between layer parameters and the store's flat-sequence protocol.
//!
//! Each layer trains in its own namespace, so the four keys of layer `n` are
//! `layer{n}/W1`, `layer{n}/W2`, `layer{n}/b1` and `layer{n}/b2`.

use super::ParameterStore;
use crate::error::Result;
use crate::layers::{LayerParameters, LayerShape};
use crate::utils::{flat_to_matrix, flat_to_vector, matrix_to_flat, vector_to_flat};
use ndarray::{Array1, Array2};

pub const KEY_W1: &str = "W1";
pub const KEY_W2: &str = "W2";
pub const KEY_B1: &str = "b1";
pub const KEY_B2: &str = "b2";

/// Named-parameter access to a [`ParameterStore`] within one layer namespace.
pub struct ParamClient<'a> {
    store: &'a dyn ParameterStore,
    namespace: String,
}

impl<'a> ParamClient<'a> {
    pub fn new(store: &'a dyn ParameterStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Client for the namespace of hidden layer `layer`.
    pub fn for_layer(store: &'a dyn ParameterStore, layer: usize) -> Self {
        Self::new(store, format!("layer{layer}"))
    }

    pub fn store(&self) -> &'a dyn ParameterStore {
        self.store
    }

    pub fn worker_rank(&self) -> usize {
        self.store.worker_rank()
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}/{}", self.namespace, name)
    }

    pub fn write_matrix(&self, name: &str, m: &Array2<f64>) -> Result<()> {
        self.store.write(&self.key(name), matrix_to_flat(m))
    }

    pub fn write_vector(&self, name: &str, v: &Array1<f64>) -> Result<()> {
        self.store.write(&self.key(name), vector_to_flat(v))
    }

    /// Reads `name` and reshapes it to `rows × cols`.
    pub fn read_matrix(&self, name: &str, rows: usize, cols: usize) -> Result<Array2<f64>> {
        flat_to_matrix(self.store.read(&self.key(name))?, rows, cols)
    }

    /// Reads `name` as a vector of whatever length is stored.
    pub fn read_vector(&self, name: &str) -> Result<Array1<f64>> {
        flat_to_vector(self.store.read(&self.key(name))?, None)
    }

    pub fn update_matrix(&self, name: &str, delta: &Array2<f64>) -> Result<()> {
        self.store.atomic_update(&self.key(name), &matrix_to_flat(delta))
    }

    pub fn update_vector(&self, name: &str, delta: &Array1<f64>) -> Result<()> {
        self.store.atomic_update(&self.key(name), &vector_to_flat(delta))
    }

    /// Publishes all four parts of a layer as initial values.
    pub fn write_layer(&self, params: &LayerParameters) -> Result<()> {
        self.write_matrix(KEY_W1, &params.w1)?;
        self.write_matrix(KEY_W2, &params.w2)?;
        self.write_vector(KEY_B1, &params.b1)?;
        self.write_vector(KEY_B2, &params.b2)
    }

    /// Reads all four parts and checks them against `shape`.
    pub fn read_layer(&self, shape: LayerShape) -> Result<LayerParameters> {
        let LayerShape { visible, hidden } = shape;
        let params = LayerParameters {
            w1: self.read_matrix(KEY_W1, hidden, visible)?,
            w2: self.read_matrix(KEY_W2, visible, hidden)?,
            b1: flat_to_vector(self.store.read(&self.key(KEY_B1))?, Some(hidden))?,
            b2: flat_to_vector(self.store.read(&self.key(KEY_B2))?, Some(visible))?,
        };
        params.check_shape(shape)?;
        Ok(params)
    }

    /// Folds a four-part delta into the stored layer.
    pub fn update_layer(&self, delta: &LayerParameters) -> Result<()> {
        self.update_matrix(KEY_W1, &delta.w1)?;
        self.update_matrix(KEY_W2, &delta.w2)?;
        self.update_vector(KEY_B1, &delta.b1)?;
        self.update_vector(KEY_B2, &delta.b2)
    }

    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    pub fn commit_iteration(&self) -> Result<()> {
        self.store.commit_iteration()
    }

    pub fn set_total_iterations(&self, total: usize) -> Result<()> {
        self.store.set_total_iterations(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AeError;
    use crate::store::{InMemoryCluster, StalenessPolicy};
    use crate::utils::SimpleRng;

    #[test]
    fn test_layer_round_trip() {
        let cluster = InMemoryCluster::new(1, StalenessPolicy::Unbounded);
        let store = cluster.handle(0).unwrap();
        let client = ParamClient::for_layer(&store, 0);

        let shape = LayerShape::new(5, 3);
        let params = LayerParameters::random(shape, &mut SimpleRng::new(9));
        client.write_layer(&params).unwrap();

        assert_eq!(client.read_layer(shape).unwrap(), params);
    }

    #[test]
    fn test_namespaces_are_disjoint() {
        let cluster = InMemoryCluster::new(1, StalenessPolicy::Unbounded);
        let store = cluster.handle(0).unwrap();
        let first = ParamClient::for_layer(&store, 0);
        let second = ParamClient::for_layer(&store, 1);

        first.write_vector(KEY_B1, &Array1::from(vec![1.0, 2.0])).unwrap();
        second.write_vector(KEY_B1, &Array1::from(vec![7.0])).unwrap();

        assert_eq!(first.read_vector(KEY_B1).unwrap().len(), 2);
        assert_eq!(second.read_vector(KEY_B1).unwrap().to_vec(), vec![7.0]);
    }

    #[test]
    fn test_read_layer_with_wrong_shape() {
        let cluster = InMemoryCluster::new(1, StalenessPolicy::Unbounded);
        let store = cluster.handle(0).unwrap();
        let client = ParamClient::for_layer(&store, 0);
        let params = LayerParameters::random(LayerShape::new(4, 2), &mut SimpleRng::new(1));
        client.write_layer(&params).unwrap();

        let err = client.read_layer(LayerShape::new(4, 3)).unwrap_err();
        assert!(matches!(err, AeError::ShapeMismatch { .. }));
    }
}
