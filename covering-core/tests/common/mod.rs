pub mod mock_covering;
